use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Root of the tree to reconcile
    pub root: PathBuf,
}

pub async fn execute(args: ReconcileArgs, _global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    if !args.root.is_dir() {
        anyhow::bail!("{} is not a directory", args.root.display());
    }

    let root = args.root.clone();
    let stats = tokio::task::spawn_blocking(move || layerpull::reconcile(&root))
        .await
        .context("reconcile task panicked")?
        .with_context(|| format!("Failed to reconcile {}", args.root.display()))?;

    println!(
        "{}: {} whiteout(s), {} path(s) removed",
        args.root.display(),
        stats.markers,
        stats.removed
    );
    Ok(())
}
