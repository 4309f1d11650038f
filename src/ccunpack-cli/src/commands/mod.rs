//! Command handlers for the ccunpack CLI
//!
//! Each subcommand has its own module with handler functions.

pub mod atlas;
pub mod bundle;
pub mod configure;
pub mod decode;
pub mod uuid;

use indicatif::{ProgressBar, ProgressStyle};

/// Percentage bar in the style used by every long-running command
pub(crate) fn percent_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}
