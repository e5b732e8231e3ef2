use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// File counters owned by one directory upload.
///
/// `total` grows as the walk discovers files, so it is a running
/// denominator rather than a precomputed one.
#[derive(Debug, Default)]
pub struct UploadProgress {
    total: AtomicU64,
    uploaded: AtomicU64,
}

/// A consistent reading of [`UploadProgress`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub uploaded: u64,
    pub total: u64,
}

impl ProgressSnapshot {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.uploaded as f64 / self.total as f64 * 100.0
    }
}

impl UploadProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a newly discovered file. Returns the new total.
    pub fn discover(&self) -> u64 {
        self.total.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Count a successful upload and read the counters at that instant.
    pub fn complete(&self) -> ProgressSnapshot {
        let uploaded = self.uploaded.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.total.load(Ordering::SeqCst);
        ProgressSnapshot { uploaded, total }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            uploaded: self.uploaded.load(Ordering::SeqCst),
            total: self.total.load(Ordering::SeqCst),
        }
    }
}

/// Events emitted while a directory is uploaded.
#[derive(Clone, Debug)]
pub enum Progress {
    Started {
        directory: PathBuf,
    },
    FileUploaded {
        directory: PathBuf,
        path: PathBuf,
        key: String,
        uploaded: u64,
        total: u64,
        percentage: f64,
        /// Time spent on this file alone.
        elapsed: Duration,
    },
    Finished {
        directory: PathBuf,
        files: u64,
        bytes: u64,
        /// Wall-clock time for the whole directory.
        elapsed: Duration,
    },
}

impl Progress {
    pub fn directory(&self) -> &PathBuf {
        match self {
            Self::Started { directory }
            | Self::FileUploaded { directory, .. }
            | Self::Finished { directory, .. } => directory,
        }
    }
}
