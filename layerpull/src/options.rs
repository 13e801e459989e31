//! Configuration for the importer.

use crate::error::{ImportError, ImportResult};
use crate::exec::ProcessLimits;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

/// Options shared by every import an [`Importer`](crate::Importer) runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Limits applied to every fetch and extraction command.
    #[serde(default)]
    pub limits: ProcessLimits,

    /// Registry copy tool, invoked as `<tool> copy <src> dir:<tmp> [--src-creds=..]`.
    ///
    /// Default: skopeo
    #[serde(default = "default_fetch_tool")]
    pub fetch_tool: String,

    /// Archive tool, invoked as `<tool> -xf <blob> -C <dest>`.
    ///
    /// Default: tar
    #[serde(default = "default_archive_tool")]
    pub archive_tool: String,

    /// Name of the fetch directory created inside the destination.
    ///
    /// Default: data_tmp
    #[serde(default = "default_temp_subdir")]
    pub temp_subdir: String,
}

fn default_fetch_tool() -> String {
    "skopeo".to_string()
}

fn default_archive_tool() -> String {
    "tar".to_string()
}

fn default_temp_subdir() -> String {
    "data_tmp".to_string()
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            limits: ProcessLimits::default(),
            fetch_tool: default_fetch_tool(),
            archive_tool: default_archive_tool(),
            temp_subdir: default_temp_subdir(),
        }
    }
}

impl ImportOptions {
    pub fn validate(&self) -> ImportResult<()> {
        if self.limits.address_space_bytes == 0 {
            return Err(ImportError::Config(
                "limits.address_space_bytes must be greater than 0".into(),
            ));
        }
        if self.limits.cpu_time_secs == 0 {
            return Err(ImportError::Config(
                "limits.cpu_time_secs must be greater than 0".into(),
            ));
        }
        if self.fetch_tool.trim().is_empty() {
            return Err(ImportError::Config("fetch_tool must not be empty".into()));
        }
        if self.archive_tool.trim().is_empty() {
            return Err(ImportError::Config("archive_tool must not be empty".into()));
        }

        let mut components = Path::new(&self.temp_subdir).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(()),
            _ => Err(ImportError::Config(format!(
                "temp_subdir must be a single directory name, got {:?}",
                self.temp_subdir
            ))),
        }
    }
}
