//! Hierarchical error types for image imports.
//!
//! Errors are split by where they originate:
//! - [`ExecError`]: a bounded external command failed or was killed
//! - [`ImportError`]: a pipeline stage failed (wraps [`ExecError`] with context)

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the pipeline.
pub type ImportResult<T> = Result<T, ImportError>;

// ============================================================================
// Executor Errors
// ============================================================================

/// Which process limit a child ran into.
///
/// Only limits the kernel reports with a dedicated signal appear here. An
/// RLIMIT_AS overrun just makes allocations fail, so it surfaces as
/// [`ExecError::ExecutionFailed`] with the tool's own stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    /// RLIMIT_CPU, reported through SIGXCPU
    CpuTime,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitKind::CpuTime => f.write_str("cpu time"),
        }
    }
}

/// Errors from running one external command under [`ProcessLimits`](crate::ProcessLimits).
#[derive(Debug, Error)]
pub enum ExecError {
    /// The kernel terminated the child for exceeding a limit.
    #[error("`{command}` exceeded its {limit} limit (signal {signal})")]
    ResourceExceeded {
        command: String,
        limit: LimitKind,
        signal: i32,
    },

    /// The child could not be launched, or finished unsuccessfully.
    #[error("`{command}` failed: {cause}")]
    ExecutionFailed {
        command: String,
        #[source]
        cause: ExecFailure,
    },
}

/// Underlying reason for [`ExecError::ExecutionFailed`].
#[derive(Debug, Error)]
pub enum ExecFailure {
    #[error("spawn: {0}")]
    Spawn(#[source] io::Error),

    #[error("exit code {code}: {stderr}")]
    Exit { code: i32, stderr: String },

    #[error("killed by signal {signal}: {stderr}")]
    Signal { signal: i32, stderr: String },
}

impl ExecError {
    /// The rendered (credential-redacted) command line.
    pub fn command(&self) -> &str {
        match self {
            ExecError::ResourceExceeded { command, .. } => command,
            ExecError::ExecutionFailed { command, .. } => command,
        }
    }

    pub fn is_resource_exceeded(&self) -> bool {
        matches!(self, ExecError::ResourceExceeded { .. })
    }
}

// ============================================================================
// Pipeline Errors
// ============================================================================

/// Errors that can occur while importing an image.
///
/// The pipeline stops at the first of these; nothing is retried.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The fetch tool could not copy the image.
    #[error("failed to fetch {source_url}: {source}")]
    FetchFailed {
        source_url: String,
        #[source]
        source: ExecError,
    },

    /// `manifest.json` could not be read.
    #[error("could not read manifest {}: {source}", path.display())]
    ManifestUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `manifest.json` did not decode into a layer list.
    #[error("malformed manifest {}: {reason}", path.display())]
    ManifestMalformed { path: PathBuf, reason: String },

    /// Unpacking one layer failed. Later layers were not attempted.
    #[error("failed to extract layer {index} ({digest}): {source}")]
    LayerExtractionFailed {
        index: usize,
        digest: String,
        #[source]
        source: ExecError,
    },

    /// Walking the destination tree for whiteouts failed.
    #[error("failed traversing {}: {reason}", root.display())]
    ReconcileTraversalFailed { root: PathBuf, reason: String },

    /// A whiteout marker or the path it shadows could not be removed.
    #[error("failed removing whiteout target {}: {source}", path.display())]
    WhiteoutRemovalFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The destination directory could not be prepared.
    #[error("workspace {}: {source}", path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Invalid import options.
    #[error("invalid config: {0}")]
    Config(String),
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl ImportError {
    pub fn manifest_malformed(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::ManifestMalformed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// The layer digest this error is about, if any.
    pub fn digest(&self) -> Option<&str> {
        match self {
            ImportError::LayerExtractionFailed { digest, .. } => Some(digest),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = ExecError::ResourceExceeded {
            command: "tar -xf /tmp/aaa -C /dest".into(),
            limit: LimitKind::CpuTime,
            signal: libc::SIGXCPU,
        };
        assert!(err.to_string().contains("exceeded its cpu time limit"));
        assert!(err.is_resource_exceeded());

        let err = ImportError::LayerExtractionFailed {
            index: 1,
            digest: "sha256:bbb".into(),
            source: ExecError::ExecutionFailed {
                command: "tar -xf /tmp/bbb -C /dest".into(),
                cause: ExecFailure::Exit {
                    code: 2,
                    stderr: "unexpected EOF".into(),
                },
            },
        };
        assert_eq!(
            err.to_string(),
            "failed to extract layer 1 (sha256:bbb): `tar -xf /tmp/bbb -C /dest` failed: exit code 2: unexpected EOF"
        );
        assert_eq!(err.digest(), Some("sha256:bbb"));
    }

    #[test]
    fn test_source_chain() {
        let err = ImportError::FetchFailed {
            source_url: "docker://quay.io/kubevirt/fedora".into(),
            source: ExecError::ExecutionFailed {
                command: "skopeo copy".into(),
                cause: ExecFailure::Spawn(io::Error::from(io::ErrorKind::NotFound)),
            },
        };

        let exec = err.source().expect("fetch error wraps exec error");
        assert!(exec.to_string().starts_with("`skopeo copy` failed"));
        let cause = exec.source().expect("exec error wraps its cause");
        assert!(cause.to_string().starts_with("spawn:"));
    }
}
