//! Multi-bundle driver
//!
//! Runs the full pipeline (texture decode, then resolution) over one bundle
//! or over every bundle below a root directory. A failing bundle never stops
//! the others; only cancellation does.

use std::path::{Path, PathBuf};

use crate::decoder::{DecodeReport, TextureDecoder};
use crate::resolver::{default_output_dir, process_bundle, BundleReport, ResolveOptions, NATIVE_DIR};
use crate::{CancelToken, Error, Result};

/// Share of a bundle's progress spent decoding textures
const DECODE_SHARE: f32 = 40.0;

/// Settings for one pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Texture decoder; without one, `.astc` files are left as they are and
    /// only previously decoded textures are picked up
    pub decoder: Option<TextureDecoder>,
    /// Bundles without an explicit output go to `<output_root>/<bundle name>`
    pub output_root: Option<PathBuf>,
    pub strict: bool,
}

impl PipelineConfig {
    /// Output directory for `bundle`
    pub fn output_for(&self, bundle: &Path) -> PathBuf {
        match &self.output_root {
            Some(root) => root.join(bundle.file_name().unwrap_or_default()),
            None => default_output_dir(bundle),
        }
    }
}

/// Result of running the pipeline over one bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub decode: Option<DecodeReport>,
    pub bundle: BundleReport,
}

/// One bundle's result inside a batch
#[derive(Debug)]
pub struct BundleOutcome {
    pub name: String,
    pub path: PathBuf,
    pub result: Result<PipelineReport>,
}

impl BundleOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Decode and resolve one bundle into `output`.
///
/// Progress runs 0-40 while decoding and 40-100 while resolving.
pub fn run_bundle(
    bundle: &Path,
    output: &Path,
    config: &PipelineConfig,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(f32),
) -> Result<PipelineReport> {
    let decode = match &config.decoder {
        Some(decoder) => {
            let native = bundle.join(NATIVE_DIR);
            if !native.is_dir() {
                return Err(Error::StoreMissing(native));
            }
            let report = decoder.decode_directory(&native, cancel, &mut |p| {
                progress(p / 100.0 * DECODE_SHARE)
            })?;
            if report.failed > 0 {
                tracing::warn!(
                    "{} of {} textures in {:?} failed to decode",
                    report.failed,
                    report.found,
                    bundle
                );
            }
            Some(report)
        }
        None => None,
    };
    progress(DECODE_SHARE);

    let options = ResolveOptions {
        output: Some(output.to_path_buf()),
        strict: config.strict,
    };
    let report = process_bundle(bundle, &options, cancel, &mut |p| {
        progress(DECODE_SHARE + p / 100.0 * (100.0 - DECODE_SHARE))
    })?;

    Ok(PipelineReport {
        decode,
        bundle: report,
    })
}

/// Run every immediate subdirectory of `root` as a bundle, writing to
/// `<out_root>/<name>`.
///
/// The decoder, if any, is probed once up front. `on_progress` receives the
/// overall percentage across all bundles.
pub fn process_root(
    root: &Path,
    out_root: &Path,
    config: &PipelineConfig,
    cancel: &CancelToken,
    on_progress: &mut dyn FnMut(f32),
) -> Result<Vec<BundleOutcome>> {
    if !root.is_dir() {
        return Err(Error::NotFound(root.to_path_buf()));
    }
    if let Some(decoder) = &config.decoder {
        decoder.probe()?;
    }

    let mut bundles: Vec<PathBuf> = std::fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    bundles.sort();

    tracing::info!("Found {} bundles in {:?}", bundles.len(), root);

    let total = bundles.len();
    let mut outcomes = Vec::with_capacity(total);

    for (i, bundle) in bundles.into_iter().enumerate() {
        cancel.check()?;

        let name = bundle
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        tracing::info!("[{}/{}] {}", i + 1, total, name);

        let output = out_root.join(&name);
        let result = run_bundle(&bundle, &output, config, cancel, &mut |p| {
            on_progress((i as f32 + p / 100.0) / total as f32 * 100.0)
        });

        match &result {
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => tracing::error!("Bundle {} failed: {}", name, e),
            Ok(_) => {}
        }

        outcomes.push(BundleOutcome {
            name,
            path: bundle,
            result,
        });
    }

    if total == 0 {
        on_progress(100.0);
    }

    let ok = outcomes.iter().filter(|o| o.is_success()).count();
    tracing::info!("Processed {}/{} bundles", ok, total);

    Ok(outcomes)
}
