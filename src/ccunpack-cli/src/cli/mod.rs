//! CLI argument definitions for ccunpack
//!
//! This module contains all clap-derived structs and enums for CLI parsing.

mod atlas;
mod core;

pub use atlas::AtlasCommand;
pub use core::{Cli, Commands, PipelineArgs};
