//! Atlas tool command handlers
//!
//! Standalone conversion and slicing, outside of a bundle.

use anyhow::{bail, Context, Result};
use ccunpack::{CancelToken, SliceReport};
use std::path::Path;

use crate::cli::AtlasCommand;

pub fn handle(command: AtlasCommand) -> Result<()> {
    match command {
        AtlasCommand::Convert { input, output } => convert(&input, output.as_deref()),
        AtlasCommand::BatchConvert { dir, output } => batch_convert(&dir, output.as_deref()),
        AtlasCommand::Slice {
            image,
            plist,
            output,
        } => slice(&image, &plist, output.as_deref()),
        AtlasCommand::BatchSlice { dir } => batch_slice(&dir),
        AtlasCommand::Full {
            json,
            image,
            output,
        } => full(&json, &image, output.as_deref()),
    }
}

fn convert(input: &Path, output: Option<&Path>) -> Result<()> {
    let written = ccunpack::convert_file(input, output)
        .with_context(|| format!("Failed to convert {}", input.display()))?;
    println!("Generated {}", written.display());
    Ok(())
}

fn batch_convert(dir: &Path, output: Option<&Path>) -> Result<()> {
    let results = ccunpack::convert_directory(dir, output)
        .with_context(|| format!("Failed to convert files in {}", dir.display()))?;

    let mut failed = 0;
    for result in &results {
        match (&result.output, &result.error) {
            (Some(path), _) => println!("  OK    {} -> {}", result.file, path.display()),
            (None, Some(e)) => {
                failed += 1;
                println!("  FAIL  {}: {}", result.file, e);
            }
            (None, None) => {}
        }
    }

    println!(
        "\nConverted: {}, Failed: {}",
        results.len() - failed,
        failed
    );

    if failed > 0 {
        bail!("{} of {} files failed to convert", failed, results.len());
    }
    Ok(())
}

fn print_slice(report: &SliceReport) -> Result<()> {
    println!(
        "Frames: {}, Extracted: {}, Failed: {}",
        report.frames, report.succeeded, report.failed
    );
    println!("Output: {}", report.output_dir.display());

    if report.failed > 0 {
        bail!("{} frames failed to extract", report.failed);
    }
    Ok(())
}

fn slice(image: &Path, plist: &Path, output: Option<&Path>) -> Result<()> {
    let report = ccunpack::slice_atlas(image, plist, output, &CancelToken::new())
        .with_context(|| format!("Failed to slice {}", image.display()))?;
    print_slice(&report)
}

fn batch_slice(dir: &Path) -> Result<()> {
    let report = ccunpack::slice_directory(dir, &CancelToken::new())
        .with_context(|| format!("Failed to slice atlases in {}", dir.display()))?;

    println!(
        "Plists: {}, Processed: {}, Errors: {}",
        report.descriptors, report.processed, report.errors
    );
    println!(
        "Frames: {} written, {} errors",
        report.frames_written, report.frame_errors
    );

    if report.errors > 0 {
        bail!("{} atlases could not be sliced", report.errors);
    }
    Ok(())
}

fn full(json: &Path, image: &Path, output: Option<&Path>) -> Result<()> {
    let report = ccunpack::full(json, image, output, &CancelToken::new())
        .with_context(|| format!("Failed to process {}", json.display()))?;
    print_slice(&report)
}
