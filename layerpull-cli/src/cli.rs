use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use layerpull::{ImportOptions, Importer, LimitedExecutor};

use crate::commands;

#[derive(Parser, Debug)]
#[command(
    name = "layerpull",
    version,
    about = "Fetch a registry image and compose its layers into a root filesystem"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import one image into a destination directory
    Import(commands::import::ImportArgs),
    /// Import several images listed in a file, concurrently
    Batch(commands::batch::BatchArgs),
    /// Apply whiteout markers in an existing tree
    Reconcile(commands::reconcile::ReconcileArgs),
    /// Print the effective configuration
    Config(commands::config::ConfigArgs),
}

/// Flags shared by all commands.
#[derive(Args, Debug, Clone)]
pub struct GlobalFlags {
    /// Options file (YAML, or JSON when the extension is .json)
    #[arg(long, global = true, env = "LAYERPULL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address-space limit for spawned tools, in bytes
    #[arg(long, global = true, value_name = "BYTES")]
    pub max_memory: Option<u64>,

    /// CPU-time limit for spawned tools, in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub max_cpu_secs: Option<u64>,

    /// Registry copy tool
    #[arg(long, global = true, env = "LAYERPULL_FETCH_TOOL")]
    pub fetch_tool: Option<String>,

    /// Archive extraction tool
    #[arg(long, global = true, env = "LAYERPULL_ARCHIVE_TOOL")]
    pub archive_tool: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl GlobalFlags {
    /// Options from the config file (or defaults) with flag overrides applied.
    pub fn load_options(&self) -> anyhow::Result<ImportOptions> {
        let mut options = match &self.config {
            Some(path) => read_options_file(path)?,
            None => ImportOptions::default(),
        };

        if let Some(bytes) = self.max_memory {
            options.limits.address_space_bytes = bytes;
        }
        if let Some(secs) = self.max_cpu_secs {
            options.limits.cpu_time_secs = secs;
        }
        if let Some(tool) = &self.fetch_tool {
            options.fetch_tool = tool.clone();
        }
        if let Some(tool) = &self.archive_tool {
            options.archive_tool = tool.clone();
        }

        options.validate()?;
        Ok(options)
    }

    pub fn create_importer(&self) -> anyhow::Result<Importer<LimitedExecutor>> {
        Ok(Importer::new(self.load_options()?)?)
    }
}

fn read_options_file(path: &Path) -> anyhow::Result<ImportOptions> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let is_json = path.extension().is_some_and(|ext| ext == "json");
    let options = if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON config {}", path.display()))?
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML config {}", path.display()))?
    };
    Ok(options)
}
