//! Temporary files that bridge two formats

use std::path::{Path, PathBuf};

/// A file that is removed when the guard goes out of scope.
///
/// Removal happens on every exit path (success, error, cancellation). A
/// missing file at drop time is not an error.
#[derive(Debug)]
pub struct StagingFile {
    path: PathBuf,
}

impl StagingFile {
    /// Guard `path`; the file itself may be created later
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed staging file {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove staging file {:?}: {}", self.path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atlas.tmp.json");
        std::fs::write(&path, b"[]").unwrap();

        {
            let guard = StagingFile::new(&path);
            assert!(guard.path().exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_removed_on_early_return() {
        fn fails(path: &Path) -> crate::Result<()> {
            let _guard = StagingFile::new(path);
            std::fs::write(path, b"{}")?;
            Err(crate::Error::Cancelled)
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staging.png");
        assert!(fails(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        drop(StagingFile::new(dir.path().join("never-created")));
    }
}
