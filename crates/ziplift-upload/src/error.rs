use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Boxed error returned by an object store.
pub type StoreError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to walk '{directory}': {source}")]
    Walk {
        directory: PathBuf,
        #[source]
        source: ziplift_fs::Error,
    },

    #[error("failed to open '{path}': {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to upload '{path}' as '{key}': {source}")]
    Put {
        path: PathBuf,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("upload of '{path}' as '{key}' timed out after {timeout:?}")]
    Timeout {
        path: PathBuf,
        key: String,
        timeout: Duration,
    },

    #[error("upload of '{directory}' cancelled")]
    Cancelled { directory: PathBuf },

    #[error("upload task for '{directory}' failed: {message}")]
    Task { directory: PathBuf, message: String },
}

impl UploadError {
    /// The file the failure is attributed to, when it concerns a single file.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Open { path, .. } | Self::Put { path, .. } | Self::Timeout { path, .. } => {
                Some(path)
            }
            Self::Walk { .. } | Self::Cancelled { .. } | Self::Task { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, UploadError>;
