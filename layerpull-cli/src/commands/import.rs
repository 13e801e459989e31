use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use layerpull::{ImageReference, ImportReport};

use crate::credentials;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Image to fetch, in fetch-tool syntax (e.g. docker://quay.io/org/image:tag)
    pub source_url: String,

    /// Directory to compose the root filesystem into (created if missing)
    pub destination: PathBuf,

    /// Registry access key (sent only together with a secret key)
    #[arg(long, env = "LAYERPULL_ACCESS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,

    /// Registry secret key (sent only together with an access key)
    #[arg(long, env = "LAYERPULL_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Access and secret key are base64-encoded
    #[arg(long)]
    pub base64_creds: bool,
}

pub async fn execute(args: ImportArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let importer = global.create_importer()?;
    let (access_key, secret_key) =
        credentials::resolve(args.access_key, args.secret_key, args.base64_creds)?;

    let image = ImageReference {
        source_url: args.source_url,
        destination: args.destination,
        access_key,
        secret_key,
    };
    let source_url = image.source_url.clone();

    let report = tokio::task::spawn_blocking(move || importer.import(&image))
        .await
        .context("import task panicked")?
        .with_context(|| format!("Failed to import {}", source_url))?;

    println!("{}", summary(&report));
    Ok(())
}

/// One-line description of a finished import.
pub fn summary(report: &ImportReport) -> String {
    format!(
        "{} -> {}: {} layer(s), {} whiteout(s) applied in {:.1}s",
        report.source_url,
        report.destination.display(),
        report.layers.len(),
        report.whiteouts.markers,
        report.elapsed.as_secs_f64()
    )
}
