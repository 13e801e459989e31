//! Temporary fetch directory lifecycle.

use std::io;
use std::path::{Path, PathBuf};

/// Recursively remove `temp_dir`.
///
/// Never fails: a missing directory is fine and any other error is only
/// logged, so cleanup can't mask the pipeline's own result.
pub fn cleanup(temp_dir: &Path) {
    match std::fs::remove_dir_all(temp_dir) {
        Ok(()) => tracing::debug!("Cleaned up workspace: {}", temp_dir.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to cleanup workspace {}: {}", temp_dir.display(), e),
    }
}

/// Owns the temporary fetch directory of one import.
///
/// Cleaned up exactly once: explicitly through [`Workspace::cleanup`], or on
/// drop if the import bails out early.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    cleaned: bool,
}

impl Workspace {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cleaned: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cleanup(mut self) {
        self.cleanup_once();
    }

    fn cleanup_once(&mut self) {
        if !self.cleaned {
            self.cleaned = true;
            cleanup(&self.path);
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.cleanup_once();
    }
}
