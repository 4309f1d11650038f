//! ASTC texture decoding through an external `astcenc` binary
//!
//! Bundles built for mobile store textures as `.astc`. Each one is decoded
//! to a bitmap beside it, named `<stem>.webp` so the resolver finds it in
//! place of the compressed file. The bitmap keeps its PNG encoding; readers
//! detect the format from content.

use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

use crate::manifest::DECODED_TEXTURE_EXTENSION;
use crate::{CancelToken, Error, Result, StagingFile};

/// Decoder binary looked up next to the executable and on `PATH`
pub const DEFAULT_COMMAND: &str = "astcenc-avx2";

const GUIDANCE: &str = "Download astcenc from \
https://github.com/ARM-software/astc-encoder/releases, then place astcenc-avx2 \
next to the ccunpack executable or on PATH, or pass --decoder <path>.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDecoder {
    command: PathBuf,
}

/// Outcome of decoding a directory tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeReport {
    pub found: usize,
    pub converted: usize,
    pub failed: usize,
}

impl TextureDecoder {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Pick the decoder command.
    ///
    /// An explicit path wins; otherwise a binary next to the running
    /// executable; otherwise the bare name, left to `PATH`.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        if let Some(path) = explicit {
            return Self::new(path);
        }

        let name = format!("{}{}", DEFAULT_COMMAND, std::env::consts::EXE_SUFFIX);
        let local = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|d| d.join(&name)))
            .filter(|p| p.is_file());

        match local {
            Some(path) => Self::new(path),
            None => Self::new(name),
        }
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    fn unavailable(&self) -> Error {
        Error::DecoderUnavailable {
            command: self.command.display().to_string(),
            guidance: GUIDANCE.to_string(),
        }
    }

    /// Check that the decoder runs.
    ///
    /// Some builds exit non-zero for `-help`; those still count as available
    /// when they print their banner or usage.
    pub fn probe(&self) -> Result<()> {
        let output = match Command::new(&self.command).arg("-help").output() {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!("Failed to run {:?}: {}", self.command, e);
                return Err(self.unavailable());
            }
        };

        if output.status.success() {
            return Ok(());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.contains("astcenc") || stdout.contains("usage") {
            return Ok(());
        }

        Err(self.unavailable())
    }

    /// Decode one `.astc` file; returns the path of the decoded bitmap
    pub fn decode_file(&self, input: &Path) -> Result<PathBuf> {
        let staging = StagingFile::new(input.with_extension("png"));
        let decoded = input.with_extension(DECODED_TEXTURE_EXTENSION.trim_start_matches('.'));

        let output = Command::new(&self.command)
            .arg("-dl")
            .arg(input)
            .arg(staging.path())
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => self.unavailable(),
                _ => Error::Io(e),
            })?;

        if !output.status.success() {
            return Err(Error::DecoderFailed {
                path: input.to_path_buf(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        std::fs::rename(staging.path(), &decoded)?;
        Ok(decoded)
    }

    /// Decode every `.astc` file under `dir`, any letter case.
    ///
    /// A file that fails is logged and counted. A missing decoder is fatal
    /// for the whole run.
    pub fn decode_directory(
        &self,
        dir: &Path,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(f32),
    ) -> Result<DecodeReport> {
        if !dir.is_dir() {
            return Err(Error::NotFound(dir.to_path_buf()));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            let is_astc = entry
                .path()
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("astc"));
            if entry.file_type().is_file() && is_astc {
                files.push(entry.into_path());
            }
        }

        let mut report = DecodeReport {
            found: files.len(),
            ..Default::default()
        };
        tracing::info!("Decoding {} ASTC textures under {:?}", files.len(), dir);

        for (i, file) in files.iter().enumerate() {
            cancel.check()?;
            match self.decode_file(file) {
                Ok(decoded) => {
                    tracing::debug!("{:?} -> {:?}", file, decoded);
                    report.converted += 1;
                }
                Err(e @ Error::DecoderUnavailable { .. }) => return Err(e),
                Err(e) => {
                    tracing::warn!("Failed to decode {:?}: {}", file, e);
                    report.failed += 1;
                }
            }
            progress((i + 1) as f32 / files.len() as f32 * 100.0);
        }

        if files.is_empty() {
            progress(100.0);
        }

        Ok(report)
    }
}
