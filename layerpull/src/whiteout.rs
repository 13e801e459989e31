//! Whiteout reconciliation on a composed tree.
//!
//! After a layer is unpacked, `.wh.<name>` markers it carried sit next to
//! the entries they delete. Reconciling removes both the marker and the
//! shadowed sibling, leaving standard overlay semantics in place.

use crate::error::{ImportError, ImportResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Reserved name prefix of whiteout markers.
pub const WHITEOUT_PREFIX: &str = ".wh.";

/// What one reconcile pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Markers found and removed.
    pub markers: usize,
    /// Shadowed paths that existed and were removed.
    pub removed: usize,
}

impl ReconcileStats {
    pub fn merge(&mut self, other: ReconcileStats) {
        self.markers += other.markers;
        self.removed += other.removed;
    }
}

/// Apply every whiteout marker under `root`.
///
/// Idempotent: a reconciled tree contains no markers, so a second pass
/// finds nothing to do. Aborts on the first traversal or removal error and
/// leaves whatever was already removed.
pub fn reconcile(root: &Path) -> ImportResult<ReconcileStats> {
    let markers = find_markers(root)?;
    let mut stats = ReconcileStats::default();

    for marker in markers {
        // A marker can vanish with a whited-out directory or under another
        // marker (`.wh..wh.a` shadows `.wh.a`). Its sibling still goes.
        if remove_path(&marker)? {
            stats.markers += 1;
        } else {
            trace!("Marker already removed {}", marker.display());
        }

        if let Some(target) = shadowed_path(&marker)
            && remove_path(&target)?
        {
            stats.removed += 1;
            debug!("Whiteout removed {}", target.display());
        }
    }

    if stats.markers > 0 {
        debug!(
            root = %root.display(),
            markers = stats.markers,
            removed = stats.removed,
            "Applied whiteouts"
        );
    }
    Ok(stats)
}

/// Whether `name` is a whiteout marker name.
pub fn is_whiteout(name: &str) -> bool {
    name.starts_with(WHITEOUT_PREFIX)
}

fn find_markers(root: &Path) -> ImportResult<Vec<PathBuf>> {
    let mut markers = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| ImportError::ReconcileTraversalFailed {
            root: root.to_path_buf(),
            reason: e.to_string(),
        })?;

        if entry.file_name().to_str().is_some_and(is_whiteout) {
            markers.push(entry.into_path());
        }
    }
    Ok(markers)
}

/// Sibling a marker deletes, or `None` if the stripped name is not a plain entry name.
fn shadowed_path(marker: &Path) -> Option<PathBuf> {
    let name = marker.file_name()?.to_str()?;
    let target = name.strip_prefix(WHITEOUT_PREFIX)?;
    if target.is_empty() || target == "." || target == ".." {
        return None;
    }
    Some(marker.parent()?.join(target))
}

/// Remove a file, symlink or directory tree. Returns whether anything existed.
fn remove_path(path: &Path) -> ImportResult<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(source) => {
            return Err(ImportError::WhiteoutRemovalFailed {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ImportError::WhiteoutRemovalFailed {
            path: path.to_path_buf(),
            source,
        }),
    }
}
