use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use ziplift_archive::{ArchiveReport, ExtractOptions, ExtractProgress};
use ziplift_upload::{
    FsObjectStore, HttpObjectStore, ObjectStore, Progress, UploadJob, UploadOptions, Uploader,
};

use crate::config::{Config, DEFAULT_REGION, StoreConfig};
use crate::ui::{ExtractTracker, UploadTracker};

/// Extract the configured archive, print the tree of the extraction
/// directory and upload it. Stops at the first failing stage.
pub async fn run(config: &Config, cancel: CancellationToken) -> anyhow::Result<()> {
    let archive = config.archive()?.to_path_buf();
    let bucket = config.bucket()?;
    let extract_dir = config.extract_dir.clone();

    extract(
        archive,
        extract_dir.clone(),
        config.extract_options(cancel.clone()),
    )
    .await?;

    print_tree(&extract_dir)?;

    let job = UploadJob::new(extract_dir, bucket, config.upload.prefix.clone());
    upload(vec![job], config, cancel).await
}

pub async fn extract(
    archive: PathBuf,
    destination: PathBuf,
    options: ExtractOptions,
) -> anyhow::Result<ArchiveReport> {
    let tracker = Arc::new(ExtractTracker::new(&archive));
    let observer = Arc::clone(&tracker);
    let options = options.on_progress(Arc::new(move |p: &ExtractProgress| observer.observe(p)));

    let result = tokio::task::spawn_blocking(move || {
        ziplift_archive::extract(&archive, &destination, &options).with_context(|| {
            format!(
                "failed to extract '{}' into '{}'",
                archive.display(),
                destination.display()
            )
        })
    })
    .await
    .context("extraction task failed")?;

    match result {
        Ok(report) => {
            tracker.finish(&report);
            tracing::info!(
                entries = report.entry_count(),
                bytes = report.total_bytes,
                nested = report.nested_archives.len(),
                skipped = report.skipped,
                "extraction finished"
            );
            Ok(report)
        }
        Err(e) => {
            tracker.abandon();
            Err(e)
        }
    }
}

/// Build the tree below `directory` and print it to stdout.
pub fn print_tree(directory: &Path) -> anyhow::Result<()> {
    let tree = ziplift_fs::build_tree(directory)
        .with_context(|| format!("failed to build tree for '{}'", directory.display()))?;

    let mut out = io::stdout().lock();
    tree.write_to(&mut out, 0)?;
    out.flush()?;
    Ok(())
}

/// One job per directory. With several directories each gets its own
/// `<prefix><directory name>/`; directories that would share a prefix are
/// refused, since their keys would overwrite each other.
pub fn upload_jobs(
    directories: &[PathBuf],
    bucket: &str,
    prefix: &str,
) -> anyhow::Result<Vec<UploadJob>> {
    if let [directory] = directories {
        return Ok(vec![UploadJob::new(directory.clone(), bucket, prefix)]);
    }

    let mut claimed: HashMap<String, &Path> = HashMap::new();
    let mut jobs = Vec::with_capacity(directories.len());
    for directory in directories {
        let name = directory_name(directory);
        let job_prefix = if name.is_empty() {
            prefix.to_string()
        } else {
            format!("{prefix}{name}/")
        };
        if let Some(previous) = claimed.insert(job_prefix.clone(), directory.as_path()) {
            anyhow::bail!(
                "'{}' and '{}' would both upload under '{job_prefix}'",
                previous.display(),
                directory.display()
            );
        }
        jobs.push(UploadJob::new(directory.clone(), bucket, job_prefix));
    }
    Ok(jobs)
}

fn directory_name(directory: &Path) -> String {
    directory
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .or_else(|| {
            let canonical = directory.canonicalize().ok()?;
            canonical.file_name().map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_default()
}

pub async fn upload(
    jobs: Vec<UploadJob>,
    config: &Config,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let mut options = UploadOptions::default().cancel_token(cancel);
    if let Some(timeout) = config.upload_timeout() {
        options = options.timeout(timeout);
    }

    match &config.store {
        StoreConfig::Fs { root } => {
            tracing::debug!(root = %root.display(), "using filesystem store");
            upload_with(Uploader::new(FsObjectStore::new(root)), jobs, options).await
        }
        StoreConfig::Http { endpoint, region } => {
            let store = match endpoint {
                Some(endpoint) => HttpObjectStore::new(endpoint),
                None => HttpObjectStore::for_region(region.as_deref().unwrap_or(DEFAULT_REGION)),
            }
            .context("failed to set up HTTP store")?;
            upload_with(Uploader::new(store), jobs, options).await
        }
    }
}

async fn upload_with<S: ObjectStore + 'static>(
    uploader: Uploader<S>,
    jobs: Vec<UploadJob>,
    options: UploadOptions,
) -> anyhow::Result<()> {
    let tracker = Arc::new(UploadTracker::new());
    let observer = Arc::clone(&tracker);
    let options = options.on_progress(Arc::new(move |event: &Progress| observer.observe(event)));

    let outcomes = uploader.upload_all(jobs, options).await;
    tracker.abandon_remaining();

    let mut failed = 0;
    let mut elapsed = Duration::ZERO;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => elapsed = elapsed.max(report.elapsed),
            Err(e) => {
                failed += 1;
                tracing::error!(directory = %outcome.directory.display(), error = %e, "directory upload failed");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} directory uploads failed", outcomes.len());
    }
    tracing::info!(directories = outcomes.len(), ?elapsed, "upload finished");
    Ok(())
}
