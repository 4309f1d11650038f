//! Cocos Creator bundle unpacker
//!
//! Turns a built asset bundle back into standalone files: raw assets copied
//! out of the content-addressed stores, atlas descriptors rebuilt as
//! TexturePacker-style plists, and packed atlases sliced into one image per
//! sprite frame.
//!
//! # Bundle Layout
//!
//! ```text
//! <bundle>/config.json                 manifest (paths, uuids, types, packs)
//! <bundle>/import/<shard>/<uuid>.json  serialized asset data
//! <bundle>/native/<shard>/<uuid>.<ext> raw payloads (textures, audio, ...)
//! ```
//!
//! The shard is the first two characters of the asset's canonical uuid.
//! Manifest uuids are stored compressed, see [`uuid::decompress`].

pub mod batch;
pub mod cancel;
pub mod compiled;
mod coords;
pub mod decoder;
pub mod frame;
pub mod manifest;
pub mod plist;
pub mod resolver;
pub mod slicer;
mod staging;
pub mod uuid;

use std::path::{Component, Path, PathBuf};

pub use batch::{process_root, run_bundle, BundleOutcome, PipelineConfig, PipelineReport};
pub use cancel::CancelToken;
pub use compiled::{
    classify, convert_directory, convert_file, full, parse_compiled, ConversionResult, Element,
};
pub use coords::parse_coordinates;
pub use decoder::{DecodeReport, TextureDecoder};
pub use frame::{AtlasDescriptor, AtlasFrame};
pub use manifest::{AssetRecord, Manifest};
pub use plist::{parse_plist, render_plist, PlistFrame};
pub use resolver::{process_bundle, BundleReport, ResolveOptions};
pub use slicer::{find_sibling_image, slice_atlas, slice_directory, BatchSliceReport, SliceReport};
pub use staging::StagingFile;
pub use uuid::decompress as decompress_uuid;

/// Image extensions probed, in order, when pairing a descriptor with its atlas
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Extension appended to every frame key and used for sliced frame files
pub const FRAME_EXTENSION: &str = "png";

/// Errors from bundle unpacking
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("config.json not found in {0:?}")]
    ConfigMissing(PathBuf),

    #[error("Store directory not found: {0:?}")]
    StoreMissing(PathBuf),

    #[error("File not found: {0:?}")]
    NotFound(PathBuf),

    #[error("Invalid compiled descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Invalid plist: {0}")]
    InvalidPlist(String),

    #[error("Frame '{name}' region {x},{y} {width}x{height} exceeds atlas {atlas_width}x{atlas_height}")]
    FrameOutOfBounds {
        name: String,
        x: i64,
        y: i64,
        width: i64,
        height: i64,
        atlas_width: u32,
        atlas_height: u32,
    },

    #[error("Texture decoder '{command}' is not available. {guidance}")]
    DecoderUnavailable { command: String, guidance: String },

    #[error("Texture decoder failed on {path:?} ({status}): {stderr}")]
    DecoderFailed {
        path: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("Path {0:?} leaves the output directory")]
    UnsafePath(PathBuf),

    #[error("{count} manifest records resolved to no file")]
    UnresolvedRecords { count: usize },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Join a path taken from bundle data onto `base`.
///
/// Absolute paths, drive prefixes and `..` components are refused, so the
/// result always stays under `base`.
pub fn join_within(base: &Path, relative: impl AsRef<Path>) -> Result<PathBuf> {
    let relative = relative.as_ref();
    let escapes = relative.components().any(|c| {
        matches!(
            c,
            Component::RootDir | Component::Prefix(_) | Component::ParentDir
        )
    });
    if escapes {
        return Err(Error::UnsafePath(relative.to_path_buf()));
    }
    Ok(base.join(relative))
}
