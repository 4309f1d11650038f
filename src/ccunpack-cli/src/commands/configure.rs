//! Configuration command handlers
//!
//! Handles the `configure` subcommand for setting up ccunpack defaults.

use crate::config::Config;
use anyhow::Result;
use std::path::PathBuf;

/// Handle the configure command
pub fn handle(
    decoder: Option<PathBuf>,
    output_root: Option<PathBuf>,
    strict: Option<bool>,
    show: bool,
) -> Result<()> {
    let mut config = Config::load()?;

    if show {
        show_config(&config);
        return Ok(());
    }

    if !apply(&mut config, decoder, output_root, strict) {
        show_usage();
        return Ok(());
    }

    let path = config.save()?;
    show_config(&config);
    println!("Config saved to: {}", path.display());

    Ok(())
}

/// Apply the given settings; returns false if there was nothing to change
fn apply(
    config: &mut Config,
    decoder: Option<PathBuf>,
    output_root: Option<PathBuf>,
    strict: Option<bool>,
) -> bool {
    let changed = decoder.is_some() || output_root.is_some() || strict.is_some();

    if let Some(decoder) = decoder {
        config.decoder = Some(decoder);
    }
    if let Some(root) = output_root {
        config.output_root = Some(root);
    }
    if let Some(strict) = strict {
        config.strict = strict;
    }

    changed
}

fn show_config(config: &Config) {
    match &config.decoder {
        Some(path) => println!("Decoder: {}", path.display()),
        None => println!("Decoder: astcenc-avx2 (next to ccunpack or on PATH)"),
    }
    match &config.output_root {
        Some(path) => println!("Output root: {}", path.display()),
        None => println!("Output root: out"),
    }
    println!("Strict: {}", config.strict);

    if let Ok(path) = Config::config_path() {
        println!("Config file: {}", path.display());
    }
}

fn show_usage() {
    println!("Usage: ccunpack configure --decoder /path/to/astcenc-avx2");
    println!("   or: ccunpack configure --output-root DIR --strict true");
    println!("   or: ccunpack configure --show");
}
