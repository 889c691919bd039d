use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;

/// Handle to a local audio file produced by one pipeline stage and consumed
/// by the next. Size is probed once at construction.
#[derive(Debug)]
pub struct AudioAsset {
    path: PathBuf,
    size: u64,
}

impl AudioAsset {
    /// Wrap an existing file, probing its size.
    pub fn probe(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let size = std::fs::metadata(&path)?.len();
        Ok(Self { path, size })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// File extension, lowercased, if any.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    /// Remove the underlying file. Failures are logged, never propagated —
    /// the request-scoped scratch directory removal is the backstop.
    pub fn discard(self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove intermediate audio file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_reads_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        std::fs::write(&path, b"RIFFdata").unwrap();

        let asset = AudioAsset::probe(&path).unwrap();
        assert_eq!(asset.size(), 8);
        assert_eq!(asset.extension().as_deref(), Some("wav"));
    }

    #[test]
    fn test_probe_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AudioAsset::probe(dir.path().join("missing.wav")).is_err());
    }

    #[test]
    fn test_discard_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        std::fs::write(&path, b"x").unwrap();

        AudioAsset::probe(&path).unwrap().discard();
        assert!(!path.exists());
    }
}
