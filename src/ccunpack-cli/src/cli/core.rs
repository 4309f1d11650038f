//! Core CLI definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use super::atlas::AtlasCommand;

#[derive(Parser)]
#[command(name = "ccunpack")]
#[command(about = "Cocos Creator asset bundle unpacker", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by the full-pipeline commands
#[derive(Args, Debug, Clone, Default)]
pub struct PipelineArgs {
    /// Output directory (overrides the configured output root)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Path to the astcenc binary
    #[arg(long, env = "CCUNPACK_DECODER")]
    pub decoder: Option<PathBuf>,

    /// Do not decode .astc textures before resolving
    #[arg(long)]
    pub skip_decode: bool,

    /// Fail a bundle when manifest records resolve to no file
    #[arg(long)]
    pub strict: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Unpack one bundle directory (decode textures, copy assets, rebuild
    /// and slice atlases)
    #[command(visible_alias = "b")]
    Bundle {
        /// Bundle directory containing config.json, import/ and native/
        bundle: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Unpack every bundle directory below a root
    Batch {
        /// Directory whose subdirectories are bundles
        #[arg(default_value = "res")]
        root: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    #[command(flatten)]
    Atlas(AtlasCommand),

    /// Decode every .astc texture below a directory
    #[command(visible_alias = "d")]
    Decode {
        /// Directory to search recursively
        dir: PathBuf,

        /// Path to the astcenc binary
        #[arg(long, env = "CCUNPACK_DECODER")]
        decoder: Option<PathBuf>,
    },

    /// Expand compressed asset uuids
    #[command(visible_alias = "u")]
    Uuid {
        /// Compressed uuids (22 or 23 characters)
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Configure default settings
    #[command(visible_alias = "c")]
    Configure {
        /// Set the default astcenc binary
        #[arg(long)]
        decoder: Option<PathBuf>,

        /// Set the default output root
        #[arg(long)]
        output_root: Option<PathBuf>,

        /// Set strict resolution on or off
        #[arg(long)]
        strict: Option<bool>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}
