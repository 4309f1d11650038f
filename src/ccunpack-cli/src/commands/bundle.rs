//! Bundle and batch command handlers

use anyhow::{bail, Context, Result};
use ccunpack::{
    process_root, run_bundle, BundleReport, CancelToken, PipelineConfig, TextureDecoder,
};
use std::path::{Path, PathBuf};

use super::percent_bar;
use crate::cli::PipelineArgs;
use crate::config::Config;

/// Merge command-line options over the config file
fn pipeline_config(args: &PipelineArgs, config: &Config) -> PipelineConfig {
    let decoder = if args.skip_decode {
        None
    } else {
        Some(TextureDecoder::resolve(
            args.decoder.as_deref().or(config.decoder.as_deref()),
        ))
    };

    PipelineConfig {
        decoder,
        output_root: config.output_root.clone(),
        strict: args.strict || config.strict,
    }
}

fn print_report(name: &str, report: &BundleReport) {
    println!("{} -> {}", name, report.output_dir.display());
    println!(
        "  Copied: {}, Skipped: {}, Missing: {}, Skeletons: {}",
        report.records_copied,
        report.records_skipped,
        report.records_missing,
        report.skeletons_extracted
    );
    println!(
        "  Packs: {} converted, {} failed",
        report.packs_converted, report.packs_failed
    );
    println!(
        "  Atlases: {} sliced, {} failed; Frames: {} written, {} errors",
        report.atlases_sliced, report.atlases_failed, report.frames_written, report.frame_errors
    );
}

/// Unpack one bundle
pub fn handle_bundle(bundle: &Path, args: &PipelineArgs) -> Result<()> {
    let config = pipeline_config(args, &Config::load()?);
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| config.output_for(bundle));

    if let Some(decoder) = &config.decoder {
        decoder.probe()?;
    }

    let name = bundle
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| bundle.display().to_string());

    let pb = percent_bar(&name);
    let result = run_bundle(bundle, &output, &config, &CancelToken::new(), &mut |p| {
        pb.set_position(p as u64)
    });
    pb.finish_and_clear();

    let report = result.with_context(|| format!("Failed to unpack {}", bundle.display()))?;
    if let Some(decode) = &report.decode {
        println!(
            "Textures: {} found, {} decoded, {} failed",
            decode.found, decode.converted, decode.failed
        );
    }
    print_report(&name, &report.bundle);

    Ok(())
}

/// Unpack every bundle below `root`
pub fn handle_batch(root: &Path, args: &PipelineArgs) -> Result<()> {
    let file_config = Config::load()?;
    let config = pipeline_config(args, &file_config);
    let out_root: PathBuf = args
        .output
        .clone()
        .or_else(|| file_config.output_root.clone())
        .unwrap_or_else(|| PathBuf::from("out"));

    let pb = percent_bar("bundles");
    let outcomes = process_root(root, &out_root, &config, &CancelToken::new(), &mut |p| {
        pb.set_position(p as u64)
    })
    .with_context(|| format!("Failed to process {}", root.display()))?;
    pb.finish_and_clear();

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => print_report(&outcome.name, &report.bundle),
            Err(e) => {
                failed += 1;
                println!("{}: FAILED: {}", outcome.name, e);
            }
        }
    }

    println!(
        "\nBundles: {}, Succeeded: {}, Failed: {}",
        outcomes.len(),
        outcomes.len() - failed,
        failed
    );

    if failed > 0 {
        bail!("{} of {} bundles failed", failed, outcomes.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let config = Config {
            decoder: Some(PathBuf::from("/opt/astcenc")),
            output_root: Some(PathBuf::from("unpacked")),
            strict: false,
        };
        let args = PipelineArgs {
            decoder: Some(PathBuf::from("/usr/local/bin/astcenc-avx2")),
            strict: true,
            ..Default::default()
        };

        let pipeline = pipeline_config(&args, &config);
        assert_eq!(
            pipeline.decoder.as_ref().map(|d| d.command().to_path_buf()),
            Some(PathBuf::from("/usr/local/bin/astcenc-avx2"))
        );
        assert!(pipeline.strict);
        assert_eq!(pipeline.output_root, Some(PathBuf::from("unpacked")));
    }

    #[test]
    fn test_config_decoder_and_skip() {
        let config = Config {
            decoder: Some(PathBuf::from("/opt/astcenc")),
            output_root: None,
            strict: true,
        };

        let pipeline = pipeline_config(&PipelineArgs::default(), &config);
        assert_eq!(
            pipeline.decoder.map(|d| d.command().to_path_buf()),
            Some(PathBuf::from("/opt/astcenc"))
        );
        assert!(pipeline.strict);

        let args = PipelineArgs {
            skip_decode: true,
            ..Default::default()
        };
        assert!(pipeline_config(&args, &config).decoder.is_none());
    }
}
