//! Ordered layer extraction into the destination tree.

use crate::error::{ImportError, ImportResult};
use crate::exec::CommandRunner;
use crate::manifest::{LayerRef, Manifest};
use crate::whiteout::{self, ReconcileStats};
use std::path::Path;

/// Outcome of [`LayerExtractor::extract_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Digests applied, in order.
    pub layers: Vec<String>,
    /// Whiteouts applied across all layers.
    pub whiteouts: ReconcileStats,
}

/// Unpacks layer blobs with the archive tool (`tar` by default), one at a time.
///
/// Layers are applied strictly in manifest order; a later layer overwrites
/// what an earlier one wrote. Whiteouts are reconciled after every layer.
#[derive(Debug, Clone)]
pub struct LayerExtractor<R> {
    runner: R,
    tool: String,
}

impl<R: CommandRunner> LayerExtractor<R> {
    pub fn new(runner: R, tool: impl Into<String>) -> Self {
        Self {
            runner,
            tool: tool.into(),
        }
    }

    /// Apply every layer of `manifest` from `temp_dir` onto `destination`.
    ///
    /// Stops at the first failing layer and reports it; layers after it are
    /// never attempted and what was already written stays in place.
    pub fn extract_all(
        &self,
        manifest: &Manifest,
        temp_dir: &Path,
        destination: &Path,
    ) -> ImportResult<ExtractionReport> {
        let mut report = ExtractionReport::default();
        let total = manifest.len();

        for (index, layer) in manifest.layers.iter().enumerate() {
            tracing::info!(
                layer = index + 1,
                total,
                digest = %layer.digest,
                "Extracting layer"
            );

            self.extract_layer(index, layer, temp_dir, destination)?;
            let stats = whiteout::reconcile(destination)?;

            report.whiteouts.merge(stats);
            report.layers.push(layer.digest.clone());
        }

        Ok(report)
    }

    fn extract_layer(
        &self,
        index: usize,
        layer: &LayerRef,
        temp_dir: &Path,
        destination: &Path,
    ) -> ImportResult<()> {
        let blob = temp_dir.join(layer.blob_name());
        let args = vec![
            "-xf".to_string(),
            blob.display().to_string(),
            "-C".to_string(),
            destination.display().to_string(),
        ];

        self.runner
            .run(&self.tool, &args)
            .map(|_| ())
            .map_err(|source| ImportError::LayerExtractionFailed {
                index,
                digest: layer.digest.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExecError, LimitKind};
    use crate::testing::RecordingRunner;

    fn manifest(digests: &[&str]) -> Manifest {
        Manifest {
            layers: digests.iter().map(|d| LayerRef::new(*d)).collect(),
        }
    }

    fn blob_args(args: &[String]) -> &str {
        &args[1]
    }

    #[test]
    fn test_extracts_each_layer_once_in_order() {
        let dest = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new();
        let extractor = LayerExtractor::new(&runner, "tar");
        let manifest = manifest(&["sha256:ccc", "sha256:aaa", "sha256:bbb"]);

        let report = extractor
            .extract_all(&manifest, Path::new("/work/data_tmp"), dest.path())
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 3);
        let blobs: Vec<&str> = calls.iter().map(|(_, args)| blob_args(args)).collect();
        assert_eq!(
            blobs,
            vec![
                "/work/data_tmp/ccc",
                "/work/data_tmp/aaa",
                "/work/data_tmp/bbb"
            ]
        );
        for (program, args) in &calls {
            assert_eq!(program, "tar");
            assert_eq!(args[0], "-xf");
            assert_eq!(args[2], "-C");
            assert_eq!(args[3], dest.path().display().to_string());
        }
        assert_eq!(report.layers, vec!["sha256:ccc", "sha256:aaa", "sha256:bbb"]);
    }

    #[test]
    fn test_stops_at_first_failed_layer() {
        let dest = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new().fail_when(
            |_, args| args[1].ends_with("/bbb"),
            |command| ExecError::ResourceExceeded {
                command,
                limit: LimitKind::CpuTime,
                signal: libc::SIGXCPU,
            },
        );
        let extractor = LayerExtractor::new(&runner, "tar");
        let manifest = manifest(&["sha256:aaa", "sha256:bbb", "sha256:ccc"]);

        let err = extractor
            .extract_all(&manifest, Path::new("/work/data_tmp"), dest.path())
            .unwrap_err();

        match &err {
            ImportError::LayerExtractionFailed {
                index,
                digest,
                source,
            } => {
                assert_eq!(*index, 1);
                assert_eq!(digest, "sha256:bbb");
                assert!(source.is_resource_exceeded());
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let attempted: Vec<String> = runner
            .calls()
            .iter()
            .map(|(_, args)| blob_args(args).to_string())
            .collect();
        assert_eq!(attempted, vec!["/work/data_tmp/aaa", "/work/data_tmp/bbb"]);
    }

    #[test]
    fn test_first_failure_is_not_masked() {
        let dest = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new().fail_when(
            |_, args| args[1].ends_with("/aaa"),
            |command| ExecError::ExecutionFailed {
                command,
                cause: crate::error::ExecFailure::Exit {
                    code: 2,
                    stderr: "not a tar archive".into(),
                },
            },
        );
        let extractor = LayerExtractor::new(&runner, "tar");

        let err = extractor
            .extract_all(
                &manifest(&["sha256:aaa", "sha256:bbb"]),
                Path::new("/work/data_tmp"),
                dest.path(),
            )
            .unwrap_err();

        assert_eq!(err.digest(), Some("sha256:aaa"));
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_whiteouts_reconciled_between_layers() {
        let dest = tempfile::tempdir().unwrap();
        let dest_path = dest.path().to_path_buf();

        // Stand-in for tar: layer "aaa" writes x, layer "bbb" writes its marker.
        let runner = RecordingRunner::new().on_success(move |_, args| {
            if args[1].ends_with("/aaa") {
                std::fs::write(dest_path.join("x"), b"from a").unwrap();
                std::fs::write(dest_path.join("y"), b"from a").unwrap();
            } else {
                std::fs::write(dest_path.join(".wh.x"), b"").unwrap();
            }
        });
        let extractor = LayerExtractor::new(&runner, "tar");

        let report = extractor
            .extract_all(
                &manifest(&["sha256:aaa", "sha256:bbb"]),
                Path::new("/work/data_tmp"),
                dest.path(),
            )
            .unwrap();

        assert!(!dest.path().join("x").exists());
        assert!(!dest.path().join(".wh.x").exists());
        assert!(dest.path().join("y").exists());
        assert_eq!(report.whiteouts, ReconcileStats { markers: 1, removed: 1 });
    }

    #[test]
    fn test_empty_manifest_is_noop() {
        let dest = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new();
        let report = LayerExtractor::new(&runner, "tar")
            .extract_all(&manifest(&[]), Path::new("/work/data_tmp"), dest.path())
            .unwrap();

        assert!(runner.calls().is_empty());
        assert_eq!(report, ExtractionReport::default());
    }
}
