use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, UploadError};
use crate::key::object_key;
use crate::progress::{Progress, UploadProgress};
use crate::store::{ObjectBody, ObjectStore};

pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;

#[derive(Clone, Default)]
pub struct UploadOptions {
    /// Deadline for a single file's put. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub cancel: CancellationToken,
    pub on_progress: Option<ProgressCallback>,
}

impl UploadOptions {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    fn report(&self, progress: Progress) {
        if let Some(ref callback) = self.on_progress {
            callback(&progress);
        }
    }
}

/// One directory to upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadJob {
    pub directory: PathBuf,
    pub bucket: String,
    /// Prepended to every object key.
    pub prefix: String,
}

impl UploadJob {
    pub fn new(
        directory: impl Into<PathBuf>,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            directory: directory.into(),
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct UploadReport {
    pub directory: PathBuf,
    pub files: u64,
    pub bytes: u64,
    /// Keys in upload order.
    pub keys: Vec<String>,
    pub elapsed: Duration,
}

/// Result of one job run by [`Uploader::upload_all`].
#[derive(Debug)]
pub struct JobOutcome {
    pub directory: PathBuf,
    pub result: Result<UploadReport>,
}

/// Uploads directories to an [`ObjectStore`].
pub struct Uploader<S> {
    store: Arc<S>,
}

impl<S> Clone for Uploader<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ObjectStore + 'static> Uploader<S> {
    pub fn new(store: S) -> Self {
        Self::from_arc(Arc::new(store))
    }

    pub fn from_arc(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Upload every regular file below `job.directory`, one at a time, in
    /// walk order.
    ///
    /// The first walk error, open error, put error, timeout or cancellation
    /// ends the call; no later file is attempted. Progress counters belong
    /// to this call alone.
    pub async fn upload_directory(
        &self,
        job: &UploadJob,
        options: &UploadOptions,
    ) -> Result<UploadReport> {
        let started = Instant::now();
        let progress = UploadProgress::new();
        let mut report = UploadReport {
            directory: job.directory.clone(),
            ..UploadReport::default()
        };

        tracing::info!(
            directory = %job.directory.display(),
            bucket = %job.bucket,
            prefix = %job.prefix,
            "uploading directory"
        );
        options.report(Progress::Started {
            directory: job.directory.clone(),
        });

        for walked in ziplift_fs::walk_files(&job.directory) {
            if options.cancel.is_cancelled() {
                return Err(UploadError::Cancelled {
                    directory: job.directory.clone(),
                });
            }

            let file = walked.map_err(|source| UploadError::Walk {
                directory: job.directory.clone(),
                source,
            })?;
            progress.discover();

            let key = object_key(&job.prefix, &file.relative);
            let file_started = Instant::now();
            let bytes = self.put_file(job, &file.path, &key, options).await?;
            let elapsed = file_started.elapsed();
            let snapshot = progress.complete();

            tracing::debug!(
                path = %file.path.display(),
                key = %key,
                bytes,
                ?elapsed,
                "uploaded file"
            );

            report.files = snapshot.uploaded;
            report.bytes += bytes;
            options.report(Progress::FileUploaded {
                directory: job.directory.clone(),
                path: file.path,
                key: key.clone(),
                uploaded: snapshot.uploaded,
                total: snapshot.total,
                percentage: snapshot.percentage(),
                elapsed,
            });
            report.keys.push(key);
        }

        report.elapsed = started.elapsed();
        tracing::info!(
            directory = %job.directory.display(),
            files = report.files,
            bytes = report.bytes,
            elapsed = ?report.elapsed,
            "directory upload finished"
        );
        options.report(Progress::Finished {
            directory: job.directory.clone(),
            files: report.files,
            bytes: report.bytes,
            elapsed: report.elapsed,
        });

        Ok(report)
    }

    async fn put_file(
        &self,
        job: &UploadJob,
        path: &Path,
        key: &str,
        options: &UploadOptions,
    ) -> Result<u64> {
        let body = ObjectBody::from_file(path)
            .await
            .map_err(|source| UploadError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let len = body.len();
        let put = self.store.put(&job.bucket, key, body);

        let outcome = tokio::select! {
            biased;
            () = options.cancel.cancelled() => {
                return Err(UploadError::Cancelled {
                    directory: job.directory.clone(),
                });
            }
            outcome = with_deadline(put, options.timeout) => outcome,
        };

        match outcome {
            Some(Ok(())) => Ok(len),
            Some(Err(e)) => Err(UploadError::Put {
                path: path.to_path_buf(),
                key: key.to_string(),
                source: Box::new(e),
            }),
            None => Err(UploadError::Timeout {
                path: path.to_path_buf(),
                key: key.to_string(),
                timeout: options.timeout.unwrap_or_default(),
            }),
        }
    }

    /// Run one task per job and wait for all of them.
    ///
    /// Jobs share nothing but the store; a failed or panicked job does not
    /// affect its siblings. Outcomes come back in job order.
    pub async fn upload_all(&self, jobs: Vec<UploadJob>, options: UploadOptions) -> Vec<JobOutcome> {
        let mut tasks = JoinSet::new();
        let mut spawned = HashMap::new();

        for (index, job) in jobs.into_iter().enumerate() {
            let uploader = self.clone();
            let options = options.clone();
            let directory = job.directory.clone();
            let handle = tasks.spawn(async move {
                let result = uploader.upload_directory(&job, &options).await;
                JobOutcome {
                    directory: job.directory,
                    result,
                }
            });
            spawned.insert(handle.id(), (index, directory));
        }

        let mut outcomes = Vec::with_capacity(spawned.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, outcome)) => {
                    let index = spawned.get(&id).map_or(usize::MAX, |(index, _)| *index);
                    outcomes.push((index, outcome));
                }
                Err(e) => {
                    let (index, directory) = spawned.remove(&e.id()).unwrap_or_default();
                    tracing::error!(directory = %directory.display(), error = %e, "upload task failed");
                    outcomes.push((
                        index,
                        JobOutcome {
                            directory: directory.clone(),
                            result: Err(UploadError::Task {
                                directory,
                                message: e.to_string(),
                            }),
                        },
                    ));
                }
            }
        }

        outcomes.sort_by_key(|(index, _)| *index);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }
}

async fn with_deadline<F: Future>(future: F, limit: Option<Duration>) -> Option<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, future).await.ok(),
        None => Some(future.await),
    }
}
