//! Archive extraction for ZIP and TAR formats.
//!
//! Every archive goes through the same [`EntrySource`] pipeline: the name is
//! checked against the metadata sentinel, sanitized against the extraction
//! root, checked against symlinks already on disk, and only then written.
//! A regular file whose name carries a nested-archive suffix is unpacked
//! into its own directory right after it is written, and removed once that
//! succeeds.
//!
//! # Platform Behavior
//!
//! **Unix**: permission bits from the archive are applied according to the
//! selected [`PermissionStrategy`](crate::PermissionStrategy).
//!
//! **Windows (non-Unix)**: permission handling is a no-op.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use crate::entry::{ArchiveReport, Entry, EntryKind};
use crate::error::{Error, Result};
use crate::format::{self, ArchiveFormat};
use crate::options::{ExtractOptions, ExtractProgress};
use crate::sanitize::{
    self, ensure_real_containment, ensure_real_target, sanitize_path, sanitize_symlink_target,
};

#[cfg(feature = "tar")]
mod tar;
#[cfg(feature = "zip")]
mod zip;

#[cfg(feature = "tar")]
pub use tar::{TarArchive, TarSource};
#[cfg(feature = "zip")]
pub use zip::ZipSource;

/// Label used in errors when extracting from an anonymous reader.
const READER_LABEL: &str = "<reader>";

/// An entry read from an archive but not yet written.
pub struct PendingEntry<'a> {
    pub original_path: PathBuf,
    pub size: u64,
    pub mode: Option<u32>,
    pub kind: PendingEntryKind<'a>,
}

pub enum PendingEntryKind<'a> {
    /// Regular file; the reader streams its content straight from the archive.
    File(Box<dyn Read + 'a>),
    Directory,
    Symlink { target: PathBuf },
}

/// Archive-specific entry source.
///
/// A lending iterator: each entry borrows the source until it is dropped,
/// so content is streamed without buffering whole files.
pub trait EntrySource {
    fn next_entry(&mut self) -> Option<Result<PendingEntry<'_>>>;
    fn format(&self) -> ArchiveFormat;
}

/// An archive whose format has been detected and whose reader is ready.
pub enum OpenedArchive<R: Read + Seek> {
    #[cfg(feature = "zip")]
    Zip(ZipSource<R>),
    #[cfg(feature = "tar")]
    Tar(TarArchive<R>),
}

impl<R: Read + Seek> OpenedArchive<R> {
    /// Detect the format of `reader` and open the matching source.
    pub fn open(mut reader: R, label: impl Into<PathBuf>) -> Result<Self> {
        let label = label.into();
        let detected = format::detect_from_reader(&mut reader).map_err(|source| Error::ArchiveOpen {
            archive: label.clone(),
            source,
        })?;

        match detected {
            #[cfg(feature = "zip")]
            Some(ArchiveFormat::Zip) => Ok(Self::Zip(ZipSource::new(reader, label)?)),
            #[cfg(feature = "tar")]
            Some(ArchiveFormat::Tar(codec)) => Ok(Self::Tar(TarArchive::new(reader, codec, label))),
            #[allow(unreachable_patterns)]
            _ => Err(Error::UnsupportedFormat { archive: label }),
        }
    }

    pub fn format(&self) -> ArchiveFormat {
        match self {
            #[cfg(feature = "zip")]
            Self::Zip(source) => source.format(),
            #[cfg(feature = "tar")]
            Self::Tar(archive) => archive.format(),
        }
    }
}

/// Open an archive file on disk.
pub fn open_archive(path: &Path) -> Result<OpenedArchive<BufReader<File>>> {
    let file = File::open(path).map_err(|source| Error::ArchiveOpen {
        archive: path.to_path_buf(),
        source,
    })?;
    OpenedArchive::open(BufReader::new(file), path)
}

/// Extract `archive` into `destination`, unpacking nested archives.
///
/// `destination` is created (with ancestors) if missing. The call only
/// succeeds once every entry at every nesting level has been written.
pub fn extract(
    archive: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    options: &ExtractOptions,
) -> Result<ArchiveReport> {
    let archive = archive.as_ref();
    let root = prepare_root(destination.as_ref())?;
    let opened = open_archive(archive)?;

    tracing::info!(
        archive = %archive.display(),
        format = %opened.format(),
        destination = %root.display(),
        "extracting archive"
    );

    let mut extractor = Extractor::new(options, opened.format());
    extractor.run_opened(opened, &root, 0)?;
    Ok(extractor.report)
}

/// Extract archive with automatic format detection.
///
/// Nested archives found inside are still unpacked from disk.
pub fn extract_from_reader<R: Read + Seek>(
    reader: R,
    destination: &Path,
    options: &ExtractOptions,
) -> Result<ArchiveReport> {
    let root = prepare_root(destination)?;
    let opened = OpenedArchive::open(reader, READER_LABEL)?;
    let mut extractor = Extractor::new(options, opened.format());
    extractor.run_opened(opened, &root, 0)?;
    Ok(extractor.report)
}

/// Extract archive using explicit source.
///
/// This function allows direct use of an EntrySource implementation
/// without automatic format detection.
pub fn extract_with_source<S: EntrySource>(
    source: &mut S,
    destination: &Path,
    options: &ExtractOptions,
) -> Result<ArchiveReport> {
    let root = prepare_root(destination)?;
    let mut extractor = Extractor::new(options, source.format());
    extractor.run_source(source, &root, 0)?;
    Ok(extractor.report)
}

fn prepare_root(destination: &Path) -> Result<PathBuf> {
    fs::create_dir_all(destination).map_err(|source| Error::DirectoryCreationFailed {
        path: destination.to_path_buf(),
        source,
    })?;
    destination
        .canonicalize()
        .map_err(|source| Error::ExtractionFailed {
            path: destination.to_path_buf(),
            source,
        })
}

struct Extractor<'o> {
    options: &'o ExtractOptions,
    report: ArchiveReport,
    processed: u64,
}

impl<'o> Extractor<'o> {
    fn new(options: &'o ExtractOptions, format: ArchiveFormat) -> Self {
        Self {
            options,
            report: ArchiveReport::new(format),
            processed: 0,
        }
    }

    fn run_opened<R: Read + Seek>(
        &mut self,
        opened: OpenedArchive<R>,
        root: &Path,
        depth: usize,
    ) -> Result<()> {
        match opened {
            #[cfg(feature = "zip")]
            OpenedArchive::Zip(mut source) => self.run_source(&mut source, root, depth),
            #[cfg(feature = "tar")]
            OpenedArchive::Tar(mut archive) => {
                let mut source = archive.entries()?;
                self.run_source(&mut source, root, depth)
            }
        }
    }

    fn run_source<S: EntrySource + ?Sized>(
        &mut self,
        source: &mut S,
        root: &Path,
        depth: usize,
    ) -> Result<()> {
        loop {
            if self.options.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let Some(pending) = source.next_entry() else {
                return Ok(());
            };
            self.process(pending?, root, depth)?;
        }
    }

    fn process(&mut self, pending: PendingEntry<'_>, root: &Path, depth: usize) -> Result<()> {
        let PendingEntry {
            original_path,
            size,
            mode,
            kind,
        } = pending;

        if sanitize::leads_with_metadata_dir(&original_path) {
            tracing::debug!(entry = %original_path.display(), "skipping metadata entry");
            self.report.skipped += 1;
            return Ok(());
        }

        let sanitized = sanitize_path(&original_path, root)?;
        if sanitized.is_root() {
            return match kind {
                PendingEntryKind::Directory => Ok(()),
                _ => Err(Error::InvalidPath {
                    entry: original_path,
                }),
            };
        }

        let target = sanitized.resolved;
        ensure_real_containment(root, &target, &original_path)?;

        let (kind, written) = match kind {
            PendingEntryKind::Directory => {
                create_dir(&target)?;
                (EntryKind::Directory, 0)
            }
            PendingEntryKind::File(mut reader) => {
                let written = write_file(&mut reader, &target)?;
                self.options
                    .perm_strategy
                    .apply_to_path(&target, mode)
                    .map_err(|source| Error::ExtractionFailed {
                        path: target.clone(),
                        source,
                    })?;
                (EntryKind::File, written)
            }
            PendingEntryKind::Symlink { target: link_target } => {
                let location = real_location(&target)?;
                let resolved = sanitize_symlink_target(&link_target, &location, root)?;
                ensure_real_target(root, &resolved, &link_target)?;
                clear_existing(&target)?;
                write_symlink(&link_target, &target)?;
                (EntryKind::Symlink { target: link_target }, 0)
            }
        };

        tracing::debug!(
            entry = %original_path.display(),
            size,
            written,
            depth,
            "extracted entry"
        );

        let is_file = kind == EntryKind::File;
        self.processed += 1;
        self.report.total_bytes += written;
        self.report.entries.push(
            Entry::new(original_path.clone(), target.clone(), written, mode, kind).at_depth(depth),
        );
        self.options.report(ExtractProgress {
            entries: self.processed,
            bytes: self.report.total_bytes,
            current: original_path,
            depth,
        });

        if is_file && self.options.is_nested_archive(&target) {
            self.unpack_nested(&target, depth + 1)?;
        }

        Ok(())
    }

    /// Extract a nested archive into the directory that contains it, then
    /// remove it. On failure the nested archive is left where it is.
    fn unpack_nested(&mut self, archive: &Path, depth: usize) -> Result<()> {
        if depth > self.options.max_depth {
            return Err(Error::NestingTooDeep {
                archive: archive.to_path_buf(),
                max_depth: self.options.max_depth,
            });
        }

        let parent = archive.parent().unwrap_or(archive);
        let nested_root = parent
            .canonicalize()
            .map_err(|source| Error::ExtractionFailed {
                path: parent.to_path_buf(),
                source,
            })?;

        tracing::info!(archive = %archive.display(), depth, "unpacking nested archive");

        let opened = open_archive(archive)?;
        if let Err(e) = self.run_opened(opened, &nested_root, depth) {
            tracing::warn!(archive = %archive.display(), depth, error = %e, "nested archive failed");
            return Err(e);
        }

        match fs::remove_file(archive) {
            Ok(()) => {}
            // The nested archive replaced itself with a same-named entry
            // that was already unpacked and removed.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(Error::ExtractionFailed {
                    path: archive.to_path_buf(),
                    source,
                });
            }
        }
        self.report.nested_archives.push(archive.to_path_buf());
        Ok(())
    }
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|source| Error::DirectoryCreationFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Create the parent of `link` and return `link` placed in the parent's
/// canonical directory.
fn real_location(link: &Path) -> Result<PathBuf> {
    let (Some(parent), Some(name)) = (link.parent(), link.file_name()) else {
        return Err(Error::InvalidPath {
            entry: link.to_path_buf(),
        });
    };
    create_dir(parent)?;
    let real = parent
        .canonicalize()
        .map_err(|source| Error::ExtractionFailed {
            path: parent.to_path_buf(),
            source,
        })?;
    Ok(real.join(name))
}

/// Remove a non-directory already at `path` so it is replaced, never
/// written through. Unlinking also keeps an open reader of the old file
/// intact when a nested archive contains an entry with its own name.
fn clear_existing(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if !meta.is_dir() => fs::remove_file(path).map_err(|source| Error::ExtractionFailed {
            path: path.to_path_buf(),
            source,
        }),
        _ => Ok(()),
    }
}

fn write_file(reader: &mut dyn Read, target: &Path) -> Result<u64> {
    if let Some(parent) = target.parent() {
        create_dir(parent)?;
    }
    clear_existing(target)?;

    let extraction_failed = |source| Error::ExtractionFailed {
        path: target.to_path_buf(),
        source,
    };
    let mut file = File::create(target).map_err(extraction_failed)?;
    io::copy(reader, &mut file).map_err(extraction_failed)
}

#[cfg(unix)]
fn write_symlink(target: &Path, link: &Path) -> Result<()> {
    use std::os::unix::fs::symlink;
    symlink(target, link).map_err(|e| Error::SymlinkCreationFailed {
        target: target.to_path_buf(),
        link: link.to_path_buf(),
        source: e,
    })
}

#[cfg(windows)]
fn write_symlink(target: &Path, link: &Path) -> Result<()> {
    use std::os::windows::fs;
    let resolved = link.parent().map(|p| p.join(target));
    let is_dir_target = resolved.is_some_and(|p| p.is_dir());
    let result = if is_dir_target {
        fs::symlink_dir(target, link)
    } else {
        fs::symlink_file(target, link)
    };
    result.map_err(|e| Error::SymlinkCreationFailed {
        target: target.to_path_buf(),
        link: link.to_path_buf(),
        source: e,
    })
}
