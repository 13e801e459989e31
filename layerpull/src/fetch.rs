//! Pulls an image's manifest and blobs into a local `dir:` layout.

use crate::error::{ImportError, ImportResult};
use crate::exec::CommandRunner;
use crate::image::ImageReference;
use std::path::{Path, PathBuf};

/// Drives the fetch tool (`skopeo copy` by default) through a [`CommandRunner`].
#[derive(Debug, Clone)]
pub struct ImageFetcher<R> {
    runner: R,
    tool: String,
    temp_subdir: String,
}

impl<R: CommandRunner> ImageFetcher<R> {
    pub fn new(runner: R, tool: impl Into<String>, temp_subdir: impl Into<String>) -> Self {
        Self {
            runner,
            tool: tool.into(),
            temp_subdir: temp_subdir.into(),
        }
    }

    /// Local directory the image is copied into for `image`.
    pub fn temp_dir(&self, image: &ImageReference) -> PathBuf {
        image.destination().join(&self.temp_subdir)
    }

    /// Copy `image` into its temp directory and return that directory.
    ///
    /// Partial output of a failed copy is left in place for cleanup.
    pub fn fetch(&self, image: &ImageReference) -> ImportResult<PathBuf> {
        let temp_dir = self.temp_dir(image);
        let args = self.copy_args(image, &temp_dir);

        tracing::info!(
            source_url = %image.source_url,
            temp_dir = %temp_dir.display(),
            authenticated = image.credentials().is_some(),
            "Fetching image"
        );

        self.runner
            .run(&self.tool, &args)
            .map_err(|source| ImportError::FetchFailed {
                source_url: image.source_url.clone(),
                source,
            })?;

        Ok(temp_dir)
    }

    fn copy_args(&self, image: &ImageReference, temp_dir: &Path) -> Vec<String> {
        let mut args = vec![
            "copy".to_string(),
            image.source_url.clone(),
            format!("dir:{}", temp_dir.display()),
        ];
        if let Some(creds) = image.credentials() {
            args.push(format!(
                "--src-creds={}:{}",
                creds.access_key, creds.secret_key
            ));
        }
        args
    }
}
