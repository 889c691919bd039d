//! Request-scoped scratch storage.
//!
//! Every request gets a fresh unique directory for its intermediate audio
//! files. Removal is deferred to a background task so the response path
//! never waits on filesystem cleanup, and an RAII drop guard ensures it is
//! scheduled exactly once whether the request succeeds, fails, or unwinds.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;

/// A uniquely-named scratch directory tied to one request.
#[derive(Debug)]
pub struct Scratch {
    dir: Option<PathBuf>,
}

impl Scratch {
    /// Create a fresh scratch directory under `root`.
    pub fn create(root: &Path) -> Result<Self> {
        let dir = root.join(format!("req-{}", Uuid::new_v4().simple()));
        std::fs::create_dir_all(&dir)?;
        debug!(path = %dir.display(), "created scratch directory");
        Ok(Self { dir: Some(dir) })
    }

    pub fn path(&self) -> &Path {
        self.dir
            .as_deref()
            .expect("scratch path accessed after dispose")
    }

    /// Schedule removal in the background and consume the handle. The drop
    /// guard covers paths that never reach this call.
    pub fn dispose(mut self) {
        if let Some(dir) = self.dir.take() {
            schedule_removal(dir);
        }
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            schedule_removal(dir);
        }
    }
}

/// Spawn the removal onto the runtime when one is available (the drop guard
/// can fire outside one, e.g. in teardown); fall back to removing inline.
fn schedule_removal(dir: PathBuf) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                remove_dir_quiet(&dir).await;
            });
        }
        Err(_) => {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %dir.display(), error = %e, "failed to remove scratch directory");
                }
            }
        }
    }
}

/// Remove a scratch directory. Idempotent: an already-removed directory is
/// a no-op, and failures are logged, never surfaced or retried.
pub async fn remove_dir_quiet(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!(path = %dir.display(), "removed scratch directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "failed to remove scratch directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_makes_unique_dirs() {
        let root = tempfile::tempdir().unwrap();
        let a = Scratch::create(root.path()).unwrap();
        let b = Scratch::create(root.path()).unwrap();

        assert!(a.path().exists());
        assert!(b.path().exists());
        assert_ne!(a.path(), b.path());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("req-test");
        std::fs::create_dir_all(&dir).unwrap();

        remove_dir_quiet(&dir).await;
        assert!(!dir.exists());

        // Second removal of the now-missing directory must not panic or err.
        remove_dir_quiet(&dir).await;
    }

    #[tokio::test]
    async fn test_dispose_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let scratch = Scratch::create(root.path()).unwrap();
        let path = scratch.path().to_path_buf();
        std::fs::write(path.join("a.wav"), b"x").unwrap();

        scratch.dispose();

        // Removal runs on a spawned task; yield until it lands.
        for _ in 0..100 {
            if !path.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(!path.exists());
    }
}
