use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use layerpull::ImageReference;
use tokio::sync::Semaphore;

use super::import::summary;

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// YAML or JSON list of {source_url, destination, access_key?, secret_key?}
    pub file: PathBuf,

    /// Maximum number of imports running at once
    #[arg(short, long, default_value_t = 2, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: u16,
}

pub async fn execute(args: BatchArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let importer = Arc::new(global.create_importer()?);
    let images = read_batch_file(&args.file)?;
    let total = images.len();

    let semaphore = Arc::new(Semaphore::new(args.jobs as usize));
    let mut tasks = Vec::with_capacity(total);

    for image in images {
        let importer = Arc::clone(&importer);
        let permit = Arc::clone(&semaphore).acquire_owned().await?;
        tasks.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let result = importer.import(&image);
            (image.source_url, result)
        }));
    }

    let mut errors = Vec::new();
    for task in tasks {
        let (source_url, result) = task.await.context("import task panicked")?;
        match result {
            Ok(report) => println!("{}", summary(&report)),
            Err(e) => {
                eprintln!("Error importing '{}': {:#}", source_url, anyhow::Error::from(e));
                errors.push(source_url);
            }
        }
    }

    if !errors.is_empty() {
        anyhow::bail!(
            "Failed to import {} of {} image(s): {}",
            errors.len(),
            total,
            errors.join(", ")
        );
    }
    Ok(())
}

fn read_batch_file(path: &Path) -> anyhow::Result<Vec<ImageReference>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file {}", path.display()))?;

    let images: Vec<ImageReference> = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON batch file {}", path.display()))?
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML batch file {}", path.display()))?
    };

    check_destinations(&images)?;
    Ok(images)
}

/// Reject destinations that resolve to the same tree or nest inside each
/// other; two pipelines writing one tree would race.
fn check_destinations(images: &[ImageReference]) -> anyhow::Result<()> {
    let mut resolved: Vec<(PathBuf, &Path)> = Vec::with_capacity(images.len());

    for image in images {
        let dest = image.destination();
        let path = resolve_destination(dest)
            .with_context(|| format!("Failed to resolve destination {}", dest.display()))?;

        for (other_path, other) in &resolved {
            if *other_path == path {
                anyhow::bail!("Destination {} is listed more than once", dest.display());
            }
            if path.starts_with(other_path) || other_path.starts_with(&path) {
                anyhow::bail!(
                    "Destinations {} and {} overlap",
                    other.display(),
                    dest.display()
                );
            }
        }
        resolved.push((path, dest));
    }
    Ok(())
}

/// Absolute, symlink-free form of a destination that may not exist yet.
///
/// `.` and `..` are folded lexically; the deepest existing ancestor is
/// canonicalized and the missing remainder appended to it.
fn resolve_destination(path: &Path) -> std::io::Result<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in std::path::absolute(path)?.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }

    let mut existing = normalized.as_path();
    let mut missing = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(mut base) => {
                base.extend(missing.iter().rev());
                return Ok(base);
            }
            Err(_) => match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name.to_os_string());
                    existing = parent;
                }
                _ => return Ok(normalized),
            },
        }
    }
}
