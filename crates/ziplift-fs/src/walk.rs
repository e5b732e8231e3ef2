use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};
use crate::is_metadata_component;

/// A regular file discovered by [`walk_files`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkedFile {
    /// Full path, rooted at the walk root as given.
    pub path: PathBuf,
    /// Path relative to the walk root.
    pub relative: PathBuf,
    pub len: u64,
}

type KeepEntry = fn(&DirEntry) -> bool;

/// Iterator over the regular files below a root, in enumeration order.
///
/// The first error ends the walk: it is yielded once and every later call
/// returns `None`.
pub struct FileWalk {
    root: PathBuf,
    inner: walkdir::FilterEntry<walkdir::IntoIter, KeepEntry>,
    done: bool,
}

/// Walk `root` recursively, yielding regular files only.
///
/// Directories, symlinks and anything under the metadata sentinel are
/// skipped. Order follows the platform's directory enumeration.
pub fn walk_files(root: impl AsRef<Path>) -> FileWalk {
    let root = root.as_ref().to_path_buf();
    let inner = WalkDir::new(&root)
        .follow_links(false)
        .into_iter()
        .filter_entry(keep_entry as KeepEntry);

    FileWalk {
        root,
        inner,
        done: false,
    }
}

fn keep_entry(entry: &DirEntry) -> bool {
    entry.depth() == 0 || !is_metadata_component(entry.file_name())
}

impl FileWalk {
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn fail(&mut self, source: walkdir::Error) -> Error {
        self.done = true;
        let path = source
            .path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        Error::Walk { path, source }
    }
}

impl Iterator for FileWalk {
    type Item = Result<WalkedFile>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(self.fail(e))),
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let len = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(e) => return Some(Err(self.fail(e))),
            };

            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| entry.path().to_path_buf());

            return Some(Ok(WalkedFile {
                path: entry.into_path(),
                relative,
                len,
            }));
        }
    }
}
