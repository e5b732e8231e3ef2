use std::io::Read;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::extract::{EntrySource, PendingEntry, PendingEntryKind};
use crate::format::{ArchiveFormat, Decoder, TarCompress};

/// Owns the decoded tar stream; [`TarArchive::entries`] borrows it.
pub struct TarArchive<R: Read> {
    archive: tar::Archive<Decoder<R>>,
    codec: TarCompress,
    label: PathBuf,
}

impl<R: Read> TarArchive<R> {
    pub fn new(reader: R, codec: TarCompress, label: impl Into<PathBuf>) -> Self {
        Self {
            archive: tar::Archive::new(codec.decoder(reader)),
            codec,
            label: label.into(),
        }
    }

    pub fn entries(&mut self) -> Result<TarSource<'_, Decoder<R>>> {
        let entries = self
            .archive
            .entries()
            .map_err(|e| Error::corrupted(self.label.clone(), e))?;
        Ok(TarSource {
            entries,
            codec: self.codec,
            label: self.label.clone(),
        })
    }

    pub fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Tar(self.codec)
    }
}

pub struct TarSource<'a, R: 'a + Read> {
    entries: tar::Entries<'a, R>,
    codec: TarCompress,
    label: PathBuf,
}

impl<'a, R: Read + 'a> EntrySource for TarSource<'a, R> {
    fn next_entry(&mut self) -> Option<Result<PendingEntry<'_>>> {
        loop {
            let entry = match self.entries.next()? {
                Ok(e) => e,
                Err(e) => return Some(Err(Error::corrupted(self.label.clone(), e))),
            };

            let original_path = match entry.path() {
                Ok(p) => p.into_owned(),
                Err(e) => return Some(Err(Error::corrupted(self.label.clone(), e))),
            };

            let header = entry.header();
            let size = header.size().unwrap_or(0);
            let mode = header.mode().ok();
            let entry_type = header.entry_type();

            let kind = if entry_type.is_dir() {
                PendingEntryKind::Directory
            } else if entry_type.is_symlink() {
                let target = match entry.link_name() {
                    Ok(Some(t)) => t.into_owned(),
                    Ok(None) => {
                        return Some(Err(Error::corrupted(
                            self.label.clone(),
                            format!("symlink {} has no target", original_path.display()),
                        )));
                    }
                    Err(e) => return Some(Err(Error::corrupted(self.label.clone(), e))),
                };
                PendingEntryKind::Symlink { target }
            } else if entry_type.is_file() || entry_type.is_contiguous() {
                PendingEntryKind::File(Box::new(entry))
            } else {
                tracing::debug!(
                    entry = %original_path.display(),
                    kind = ?entry_type,
                    "skipping unsupported tar entry"
                );
                continue;
            };

            return Some(Ok(PendingEntry {
                original_path,
                size,
                mode,
                kind,
            }));
        }
    }

    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Tar(self.codec)
    }
}
