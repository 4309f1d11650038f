//! Atlas slicing
//!
//! Cuts a packed atlas into one image per plist frame. Packers store rotated
//! frames turned 90 degrees clockwise, so their region in the atlas is the
//! declared size with width and height swapped; those regions are cut with
//! the swapped size and turned back 90 degrees counter-clockwise.

use image::{DynamicImage, GenericImageView, ImageReader};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::plist::{parse_plist_file, PlistFrame};
use crate::{join_within, CancelToken, Error, Result, FRAME_EXTENSION, IMAGE_EXTENSIONS};

/// Outcome of slicing one atlas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceReport {
    pub output_dir: PathBuf,
    /// Valid frames found in the plist
    pub frames: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Outcome of slicing every atlas in a directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSliceReport {
    pub descriptors: usize,
    pub processed: usize,
    /// Descriptors with no image, or whose atlas could not be sliced
    pub errors: usize,
    pub frames_written: usize,
    pub frame_errors: usize,
}

/// Load an image by content; atlas files are often named after a format
/// they are not encoded in.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?)
}

/// Default output directory: beside the image, named after its stem
pub fn default_output_dir(image_path: &Path) -> PathBuf {
    let stem = image_path.file_stem().unwrap_or_default();
    image_path.with_file_name(stem)
}

/// Cut one frame out of the atlas, undoing packer rotation
pub fn extract_frame(atlas: &DynamicImage, frame: &PlistFrame) -> Result<DynamicImage> {
    // Rotated frames occupy a height x width region in the atlas
    let (region_w, region_h) = if frame.rotated {
        (frame.height, frame.width)
    } else {
        (frame.width, frame.height)
    };

    let (atlas_w, atlas_h) = atlas.dimensions();
    let fits = |start: i64, len: i64, limit: u32| {
        start >= 0
            && len > 0
            && start
                .checked_add(len)
                .is_some_and(|end| end <= i64::from(limit))
    };
    let in_bounds = fits(frame.x, region_w, atlas_w) && fits(frame.y, region_h, atlas_h);
    if !in_bounds {
        return Err(Error::FrameOutOfBounds {
            name: frame.name.clone(),
            x: frame.x,
            y: frame.y,
            width: region_w,
            height: region_h,
            atlas_width: atlas_w,
            atlas_height: atlas_h,
        });
    }

    // Bounds checked above, all four fit in u32
    let region = atlas.crop_imm(
        frame.x as u32,
        frame.y as u32,
        region_w as u32,
        region_h as u32,
    );

    Ok(if frame.rotated {
        region.rotate270()
    } else {
        region
    })
}

fn write_frame(atlas: &DynamicImage, frame: &PlistFrame, output_dir: &Path) -> Result<PathBuf> {
    let sprite = extract_frame(atlas, frame)?;
    let path = join_within(output_dir, format!("{}.{}", frame.name, FRAME_EXTENSION))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    sprite.save(&path)?;
    Ok(path)
}

/// Slice `image_path` using the frames of `plist_path`.
///
/// Frames are written to `output_dir`, or to [`default_output_dir`] when not
/// given. A frame that fails is logged and counted; the rest still run.
pub fn slice_atlas(
    image_path: &Path,
    plist_path: &Path,
    output_dir: Option<&Path>,
    cancel: &CancelToken,
) -> Result<SliceReport> {
    if !image_path.exists() {
        return Err(Error::NotFound(image_path.to_path_buf()));
    }
    if !plist_path.exists() {
        return Err(Error::NotFound(plist_path.to_path_buf()));
    }

    let output_dir = output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_dir(image_path));
    std::fs::create_dir_all(&output_dir)?;

    let frames = parse_plist_file(plist_path)?;
    let atlas = load_image(image_path)?;
    let (width, height) = atlas.dimensions();
    tracing::info!(
        "Slicing {:?} ({}x{}, {} frames) -> {:?}",
        image_path,
        width,
        height,
        frames.len(),
        output_dir
    );

    let results: Vec<Result<PathBuf>> = frames
        .par_iter()
        .map(|frame| {
            cancel.check()?;
            let result = write_frame(&atlas, frame, &output_dir);
            match &result {
                Ok(path) => tracing::debug!(
                    "{:?} ({}x{}{})",
                    path,
                    frame.width,
                    frame.height,
                    if frame.rotated { ", rotated" } else { "" }
                ),
                Err(e) => tracing::warn!("Failed to slice frame {}: {}", frame.name, e),
            }
            result
        })
        .collect();

    cancel.check()?;

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let report = SliceReport {
        output_dir,
        frames: frames.len(),
        succeeded,
        failed: results.len() - succeeded,
    };

    if report.failed > 0 {
        tracing::warn!(
            "Sliced {}/{} frames from {:?}, {} errors",
            report.succeeded,
            report.frames,
            image_path,
            report.failed
        );
    }

    Ok(report)
}

/// Find an image beside `plist_path` with the same stem, trying
/// [`IMAGE_EXTENSIONS`] in order
pub fn find_sibling_image(plist_path: &Path) -> Option<PathBuf> {
    IMAGE_EXTENSIONS
        .iter()
        .map(|ext| plist_path.with_extension(ext))
        .find(|p| p.is_file())
}

/// Slice every `*.plist` directly inside `dir` against its sibling image.
///
/// A plist without an image, or one whose atlas fails outright, counts as an
/// error and the batch moves on. Only cancellation aborts it.
pub fn slice_directory(dir: &Path, cancel: &CancelToken) -> Result<BatchSliceReport> {
    if !dir.is_dir() {
        return Err(Error::NotFound(dir.to_path_buf()));
    }

    let mut plists: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "plist"))
        .collect();
    plists.sort();

    tracing::info!("Found {} plist files in {:?}", plists.len(), dir);

    let mut report = BatchSliceReport {
        descriptors: plists.len(),
        ..Default::default()
    };

    for (i, plist) in plists.iter().enumerate() {
        cancel.check()?;
        tracing::info!("[{}/{}] {:?}", i + 1, plists.len(), plist);

        let Some(image) = find_sibling_image(plist) else {
            tracing::warn!("Skipped {:?}: no image file found", plist);
            report.errors += 1;
            continue;
        };

        match slice_atlas(&image, plist, None, cancel) {
            Ok(r) => {
                report.processed += 1;
                report.frames_written += r.succeeded;
                report.frame_errors += r.failed;
            }
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                tracing::error!("Failed to slice {:?}: {}", plist, e);
                report.errors += 1;
            }
        }
    }

    Ok(report)
}
