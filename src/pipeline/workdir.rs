//! Guaranteed reclamation of a request's working directory.
//!
//! [`WorkDir`] owns the path a connector pulled into. The orchestrator calls
//! [`WorkDir::cleanup`] on every exit path; `Drop` removes the tree synchronously
//! when the guard is dropped without it (early return, panic unwinding).

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

pub struct WorkDir {
    path: PathBuf,
    reclaimed: bool,
}

impl WorkDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reclaimed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the directory tree. A tree that is already gone counts as removed.
    pub async fn cleanup(mut self) -> io::Result<()> {
        self.reclaimed = true;
        debug!(path = %self.path.display(), "cleaning up working directory");
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to remove working directory");
                Err(e)
            }
        }
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.reclaimed {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove working directory on drop");
            }
        }
    }
}
