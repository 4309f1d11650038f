//! Atlas tool CLI definitions

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum AtlasCommand {
    /// Convert a compiled SpriteAtlas JSON file to a plist
    Convert {
        /// Compiled JSON file
        input: PathBuf,

        /// Output plist (default: input with .plist extension)
        output: Option<PathBuf>,
    },

    /// Convert every JSON file in a directory to plists
    BatchConvert {
        /// Directory of compiled JSON files
        dir: PathBuf,

        /// Output directory (default: next to each input)
        output: Option<PathBuf>,
    },

    /// Slice an atlas image into one image per plist frame
    Slice {
        /// Atlas image
        image: PathBuf,

        /// Plist describing the frames
        plist: PathBuf,

        /// Output directory (default: beside the image, named after it)
        output: Option<PathBuf>,
    },

    /// Slice every plist in a directory against its sibling image
    BatchSlice {
        /// Directory of plist and image pairs
        dir: PathBuf,
    },

    /// Convert a compiled JSON file, then slice its image
    Full {
        /// Compiled JSON file
        json: PathBuf,

        /// Atlas image
        image: PathBuf,

        /// Output directory for the frames
        output: Option<PathBuf>,
    },
}
