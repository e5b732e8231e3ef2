use std::path::{Path, PathBuf};

use crate::format::ArchiveFormat;

/// An archive entry that has been written to disk.
#[derive(Clone, Debug)]
pub struct Entry {
    /// Name as stored in the archive.
    pub original_path: PathBuf,
    pub target_path: PathBuf,
    pub size: u64,
    pub mode: Option<u32>,
    pub kind: EntryKind,
    /// Nesting level of the archive the entry came from; the top-level
    /// archive is depth 0.
    pub depth: usize,
}

impl Entry {
    pub fn new(
        original_path: PathBuf,
        target_path: PathBuf,
        size: u64,
        mode: Option<u32>,
        kind: EntryKind,
    ) -> Self {
        Self {
            original_path,
            target_path,
            size,
            mode,
            kind,
            depth: 0,
        }
    }

    pub fn at_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self.kind, EntryKind::Symlink { .. })
    }

    pub fn symlink_target(&self) -> Option<&Path> {
        match &self.kind {
            EntryKind::Symlink { target } => Some(target),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink { target: PathBuf },
}

/// Summary of a whole extraction, nested archives included.
#[derive(Clone, Debug)]
pub struct ArchiveReport {
    /// Format of the top-level archive.
    pub format: ArchiveFormat,
    pub entries: Vec<Entry>,
    /// Bytes written for regular files across every nesting level.
    pub total_bytes: u64,
    /// Nested archives that were unpacked and then removed.
    pub nested_archives: Vec<PathBuf>,
    /// Entries skipped because they live under the metadata sentinel.
    pub skipped: usize,
}

impl ArchiveReport {
    pub fn new(format: ArchiveFormat) -> Self {
        Self {
            format,
            entries: Vec::new(),
            total_bytes: 0,
            nested_archives: Vec::new(),
            skipped: 0,
        }
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn file_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_file()).count()
    }
}
