use std::io::{Read, Seek};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::extract::{EntrySource, PendingEntry, PendingEntryKind};
use crate::format::ArchiveFormat;

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

pub struct ZipSource<R: Read + Seek> {
    archive: zip::ZipArchive<R>,
    index: usize,
    label: PathBuf,
}

impl<R: Read + Seek> ZipSource<R> {
    /// Read the central directory. `label` names the archive in errors.
    pub fn new(reader: R, label: impl Into<PathBuf>) -> Result<Self> {
        let label = label.into();
        let archive =
            zip::ZipArchive::new(reader).map_err(|e| Error::corrupted(label.clone(), e))?;
        Ok(Self {
            archive,
            index: 0,
            label,
        })
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }
}

impl<R: Read + Seek> EntrySource for ZipSource<R> {
    fn next_entry(&mut self) -> Option<Result<PendingEntry<'_>>> {
        if self.index >= self.archive.len() {
            return None;
        }
        let index = self.index;
        self.index += 1;

        let mut file = match self.archive.by_index(index) {
            Ok(f) => f,
            Err(e) => return Some(Err(Error::corrupted(self.label.clone(), e))),
        };

        // The raw name; sanitizing is left to the extractor.
        let original_path = PathBuf::from(file.name());
        let size = file.size();
        let mode = file.unix_mode();
        let is_symlink = mode.is_some_and(|m| m & S_IFMT == S_IFLNK);

        let kind = if file.is_dir() {
            PendingEntryKind::Directory
        } else if is_symlink {
            // Symlink entries store their target as the content.
            let mut target = String::new();
            if let Err(e) = file.read_to_string(&mut target) {
                return Some(Err(Error::corrupted(self.label.clone(), e)));
            }
            PendingEntryKind::Symlink {
                target: PathBuf::from(target),
            }
        } else {
            PendingEntryKind::File(Box::new(file))
        };

        Some(Ok(PendingEntry {
            original_path,
            size,
            mode,
            kind,
        }))
    }

    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }
}
