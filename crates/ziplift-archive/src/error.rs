use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open archive '{archive}': {source}")]
    ArchiveOpen { archive: PathBuf, source: io::Error },

    #[error("unsupported archive format: '{archive}'")]
    UnsupportedFormat { archive: PathBuf },

    #[error("archive '{archive}' is corrupted: {reason}")]
    Corrupted { archive: PathBuf, reason: String },

    #[error("path traversal detected: entry '{entry}' resolves to '{resolved}'")]
    PathTraversal { entry: PathBuf, resolved: PathBuf },

    #[error("symlink target escapes extraction root: '{target}' -> '{resolved}'")]
    SymlinkEscape { target: PathBuf, resolved: PathBuf },

    #[error("symlink target is absolute path: '{target}' in '{symlink}'")]
    AbsoluteSymlinkTarget { target: PathBuf, symlink: PathBuf },

    #[error("invalid entry path: '{entry}'")]
    InvalidPath { entry: PathBuf },

    #[error("failed to extract '{path}': {source}")]
    ExtractionFailed { path: PathBuf, source: io::Error },

    #[error("failed to create directory: {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error("failed to create symlink '{link}' -> '{target}': {source}")]
    SymlinkCreationFailed {
        target: PathBuf,
        link: PathBuf,
        source: io::Error,
    },

    #[error("nested archive '{archive}' exceeds the maximum depth of {max_depth}")]
    NestingTooDeep { archive: PathBuf, max_depth: usize },

    #[error("extraction cancelled")]
    Cancelled,
}

/// Coarse classification of [`Error`] for callers that only branch on the
/// failure category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The archive is missing, unreadable, corrupt or of an unknown format.
    ArchiveOpen,
    /// An entry would land outside the extraction root.
    PathTraversal,
    /// Creating or writing something under the root failed.
    ExtractionIo,
    /// A configured limit was hit.
    Limit,
    Cancelled,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ArchiveOpen { .. } | Self::UnsupportedFormat { .. } | Self::Corrupted { .. } => {
                ErrorKind::ArchiveOpen
            }
            Self::PathTraversal { .. }
            | Self::SymlinkEscape { .. }
            | Self::AbsoluteSymlinkTarget { .. }
            | Self::InvalidPath { .. } => ErrorKind::PathTraversal,
            Self::ExtractionFailed { .. }
            | Self::DirectoryCreationFailed { .. }
            | Self::SymlinkCreationFailed { .. } => ErrorKind::ExtractionIo,
            Self::NestingTooDeep { .. } => ErrorKind::Limit,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn corrupted(archive: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Corrupted {
            archive: archive.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
