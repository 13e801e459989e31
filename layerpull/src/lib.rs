//! layerpull - materialize a registry image's root filesystem.
//!
//! An import fetches the image's manifest and layer blobs with an external
//! copy tool, applies each layer in manifest order with an external archive
//! tool, reconciles `.wh.` whiteout markers after every layer and removes
//! the temporary fetch directory. Every external command runs under the
//! same [`ProcessLimits`].

pub mod error;
pub mod exec;
pub mod extract;
pub mod fetch;
pub mod image;
pub mod manifest;
pub mod options;
pub mod pipeline;
pub mod whiteout;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use error::{ExecError, ExecFailure, ImportError, ImportResult, LimitKind};
pub use exec::{CommandRunner, LimitedExecutor, ProcessLimits};
pub use extract::{ExtractionReport, LayerExtractor};
pub use fetch::ImageFetcher;
pub use image::{Credentials, ImageReference};
pub use manifest::{LayerRef, Manifest, parse_manifest};
pub use options::ImportOptions;
pub use pipeline::{ImportReport, Importer};
pub use whiteout::{ReconcileStats, reconcile};
pub use workspace::{Workspace, cleanup};
