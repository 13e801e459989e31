//! The import pipeline: fetch, parse, extract layer by layer, clean up.

use crate::error::{ImportError, ImportResult};
use crate::exec::{CommandRunner, LimitedExecutor};
use crate::extract::{ExtractionReport, LayerExtractor};
use crate::fetch::ImageFetcher;
use crate::image::ImageReference;
use crate::manifest::parse_manifest;
use crate::options::ImportOptions;
use crate::whiteout::ReconcileStats;
use crate::workspace::Workspace;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Summary of a successful import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub source_url: String,
    pub destination: PathBuf,
    /// Layer digests applied, in order.
    pub layers: Vec<String>,
    pub whiteouts: ReconcileStats,
    pub elapsed: Duration,
}

/// Imports images into destination trees.
///
/// Holds no per-image state: one `Importer` can run imports for different
/// images on parallel threads. Each import itself is strictly sequential.
///
/// # Example
///
/// ```no_run
/// use layerpull::{ImageReference, ImportOptions, Importer};
///
/// let importer = Importer::new(ImportOptions::default())?;
/// let image = ImageReference::new("docker://quay.io/kubevirt/fedora-cloud-container-disk-demo", "/data");
/// let report = importer.import(&image)?;
/// println!("applied {} layers", report.layers.len());
/// # Ok::<(), layerpull::ImportError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Importer<R> {
    fetcher: ImageFetcher<R>,
    extractor: LayerExtractor<R>,
}

impl Importer<LimitedExecutor> {
    /// Importer that runs real tools under `options.limits`.
    pub fn new(options: ImportOptions) -> ImportResult<Self> {
        let runner = LimitedExecutor::new(Arc::new(options.limits));
        Self::with_runner(&options, runner)
    }
}

impl<R: CommandRunner + Clone> Importer<R> {
    /// Importer over a caller-provided runner.
    pub fn with_runner(options: &ImportOptions, runner: R) -> ImportResult<Self> {
        options.validate()?;
        Ok(Self {
            fetcher: ImageFetcher::new(
                runner.clone(),
                options.fetch_tool.clone(),
                options.temp_subdir.clone(),
            ),
            extractor: LayerExtractor::new(runner, options.archive_tool.clone()),
        })
    }

    /// Fetch `image` and compose its root filesystem under `image.destination`.
    ///
    /// Returns the first failure; the temporary fetch directory is removed
    /// whatever the outcome. A destination that is not valid UTF-8 is
    /// rejected before anything runs.
    pub fn import(&self, image: &ImageReference) -> ImportResult<ImportReport> {
        let started = Instant::now();
        let destination = image.destination();

        // Tool arguments are UTF-8 strings; a lossy path would point elsewhere.
        if destination.to_str().is_none() {
            return Err(ImportError::Workspace {
                path: destination.to_path_buf(),
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "destination path is not valid UTF-8",
                ),
            });
        }

        std::fs::create_dir_all(destination).map_err(|source| ImportError::Workspace {
            path: destination.to_path_buf(),
            source,
        })?;

        let workspace = Workspace::new(self.fetcher.temp_dir(image));
        let result = self.run_stages(image);
        workspace.cleanup();

        let extraction = result?;
        let report = ImportReport {
            source_url: image.source_url.clone(),
            destination: destination.to_path_buf(),
            layers: extraction.layers,
            whiteouts: extraction.whiteouts,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            source_url = %report.source_url,
            destination = %report.destination.display(),
            layers = report.layers.len(),
            whiteouts = report.whiteouts.markers,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Image imported"
        );
        Ok(report)
    }

    fn run_stages(&self, image: &ImageReference) -> ImportResult<ExtractionReport> {
        let temp_dir = self.fetcher.fetch(image)?;
        let manifest = parse_manifest(&temp_dir)?;
        tracing::info!(layers = manifest.len(), "Image fetched");

        self.extractor
            .extract_all(&manifest, &temp_dir, image.destination())
    }
}
