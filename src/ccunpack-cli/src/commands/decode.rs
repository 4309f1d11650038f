//! Decode command handler

use anyhow::{bail, Context, Result};
use ccunpack::{CancelToken, TextureDecoder};
use std::path::Path;

use super::percent_bar;
use crate::config::Config;

/// Decode every .astc texture below `dir`
pub fn handle(dir: &Path, decoder: Option<&Path>) -> Result<()> {
    let config = Config::load()?;
    let decoder = TextureDecoder::resolve(decoder.or(config.decoder.as_deref()));
    decoder.probe()?;
    println!("Decoder: {}", decoder.command().display());

    let pb = percent_bar("decoding");
    let report = decoder
        .decode_directory(dir, &CancelToken::new(), &mut |p| pb.set_position(p as u64))
        .with_context(|| format!("Failed to decode textures in {}", dir.display()))?;
    pb.finish_and_clear();

    println!(
        "Found: {}, Converted: {}, Failed: {}",
        report.found, report.converted, report.failed
    );

    if report.failed > 0 {
        bail!("{} textures failed to decode", report.failed);
    }
    Ok(())
}
