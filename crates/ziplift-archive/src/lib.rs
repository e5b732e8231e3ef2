//! Sandboxed archive extraction with recursive nested-archive unpacking.
//!
//! # Architecture
//!
//! - `format.rs` - Format detection and tar codecs
//! - `sanitize.rs` - Path sanitization (zip-slip prevention)
//! - `extract/` - Extraction pipeline and per-format entry sources
//! - `entry.rs` - Extracted entry and report types
//! - `options.rs` - Depth guard, nested suffixes, permissions, progress

#[cfg(not(any(feature = "zip", feature = "tar")))]
compile_error!("enable at least one of the `zip` or `tar` features");

pub use entry::{ArchiveReport, Entry, EntryKind};
pub use error::{Error, ErrorKind, Result};
pub use extract::{
    EntrySource, OpenedArchive, PendingEntry, PendingEntryKind, extract, extract_from_reader,
    extract_with_source, open_archive,
};
#[cfg(feature = "tar")]
pub use extract::{TarArchive, TarSource};
#[cfg(feature = "zip")]
pub use extract::ZipSource;
pub use format::{ArchiveFormat, TarCompress, detect_format, detect_from_reader};
pub use options::{
    DEFAULT_MAX_DEPTH, DEFAULT_NESTED_SUFFIX, ExtractOptions, ExtractProgress, PermissionStrategy,
    ProgressCallback,
};
pub use sanitize::{
    SanitizedPath, ensure_real_containment, ensure_real_target, sanitize_path,
    sanitize_symlink_target,
};

pub mod entry;
mod error;
pub mod extract;
pub mod format;
pub mod options;
mod sanitize;
