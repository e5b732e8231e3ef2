use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read directory '{path}': {source}")]
    DirectoryRead { path: PathBuf, source: io::Error },

    #[error("failed to walk '{path}': {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
