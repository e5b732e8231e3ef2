use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Result of sanitizing an archive entry path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SanitizedPath {
    pub original: PathBuf,
    /// Normalized path relative to the extraction root. Empty when the
    /// entry names the root itself.
    pub relative: PathBuf,
    pub resolved: PathBuf,
}

impl SanitizedPath {
    pub fn is_root(&self) -> bool {
        self.relative.as_os_str().is_empty()
    }
}

/// Sanitize an entry name against the extraction root (zip-slip prevention).
///
/// Both `/` and `\` separate segments. Absolute names, drive or UNC
/// prefixes, NUL bytes and `..` segments that climb above the root are
/// rejected. This is purely lexical; see [`ensure_real_containment`] for
/// the on-disk half of the check.
pub fn sanitize_path(entry_path: impl AsRef<Path>, root: impl AsRef<Path>) -> Result<SanitizedPath> {
    let entry_path = entry_path.as_ref();
    let root = root.as_ref();

    if entry_path.as_os_str().as_encoded_bytes().contains(&0) {
        return Err(Error::InvalidPath {
            entry: entry_path.to_path_buf(),
        });
    }

    let escape = || Error::PathTraversal {
        entry: entry_path.to_path_buf(),
        resolved: normalize_path(&root.join(entry_path)),
    };

    if is_rooted(entry_path) {
        return Err(escape());
    }

    let mut relative = PathBuf::new();
    let mut depth = 0usize;
    for segment in segments(entry_path) {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            if depth == 0 {
                return Err(escape());
            }
            relative.pop();
            depth -= 1;
            continue;
        }
        if is_drive_prefix(segment) {
            return Err(escape());
        }
        relative.push(segment);
        depth += 1;
    }

    let resolved = root.join(&relative);
    if !resolved.starts_with(root) {
        return Err(escape());
    }

    Ok(SanitizedPath {
        original: entry_path.to_path_buf(),
        relative,
        resolved,
    })
}

/// Sanitize a symlink target relative to the link's own location.
///
/// Absolute targets are refused outright. A relative target may climb with
/// leading `..` segments only; a `..` after a named segment would be applied
/// to whatever that name is on disk, possibly another symlink. The result
/// must resolve inside `root`. `symlink_location` should sit in a canonical
/// directory so the leading `..` segments climb the real parents.
pub fn sanitize_symlink_target(
    target: impl AsRef<Path>,
    symlink_location: impl AsRef<Path>,
    root: impl AsRef<Path>,
) -> Result<PathBuf> {
    let target = target.as_ref();
    let symlink_location = symlink_location.as_ref();
    let root = root.as_ref();

    if is_rooted(target) || segments(target).any(is_drive_prefix) {
        return Err(Error::AbsoluteSymlinkTarget {
            target: target.to_path_buf(),
            symlink: symlink_location.to_path_buf(),
        });
    }

    let base = symlink_location.parent().unwrap_or(Path::new(""));
    let escape = || Error::SymlinkEscape {
        target: target.to_path_buf(),
        resolved: normalize_path(&base.join(segments(target).collect::<PathBuf>())),
    };

    let mut resolved = base.to_path_buf();
    let mut named = false;
    for segment in segments(target) {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            if named || !resolved.pop() {
                return Err(escape());
            }
            continue;
        }
        named = true;
        resolved.push(segment);
    }

    if !resolved.starts_with(root) || resolved == root {
        return Err(escape());
    }

    Ok(resolved)
}

/// Check a resolved symlink target against what is already on disk.
///
/// The deepest existing ancestor of `resolved`, `resolved` included, is
/// canonicalised and must stay under `root`. A dangling link on the way
/// counts as an escape.
pub fn ensure_real_target(root: &Path, resolved: &Path, target: &Path) -> Result<()> {
    let Some(existing) = deepest_existing(Some(resolved)) else {
        return Ok(());
    };

    match existing.canonicalize() {
        Ok(real) if real.starts_with(root) => Ok(()),
        Ok(real) => Err(Error::SymlinkEscape {
            target: target.to_path_buf(),
            resolved: real,
        }),
        Err(_) => Err(Error::SymlinkEscape {
            target: target.to_path_buf(),
            resolved: existing.to_path_buf(),
        }),
    }
}

/// Check that writing `resolved` cannot leave `root` through a symlink
/// already on disk.
///
/// The deepest existing ancestor of `resolved` is canonicalised and must
/// still sit under `root`, which itself must be canonical.
pub fn ensure_real_containment(root: &Path, resolved: &Path, entry: &Path) -> Result<()> {
    let Some(dir) = deepest_existing(resolved.parent()) else {
        return Ok(());
    };

    let real = match dir.canonicalize() {
        Ok(real) => real,
        Err(source) => {
            let dangling = fs::symlink_metadata(dir).is_ok_and(|m| m.file_type().is_symlink());
            if dangling {
                return Err(Error::PathTraversal {
                    entry: entry.to_path_buf(),
                    resolved: dir.to_path_buf(),
                });
            }
            return Err(Error::ExtractionFailed {
                path: dir.to_path_buf(),
                source,
            });
        }
    };

    if !real.starts_with(root) {
        return Err(Error::PathTraversal {
            entry: entry.to_path_buf(),
            resolved: real,
        });
    }

    Ok(())
}

fn deepest_existing(mut path: Option<&Path>) -> Option<&Path> {
    while let Some(candidate) = path {
        if fs::symlink_metadata(candidate).is_ok() {
            return Some(candidate);
        }
        path = candidate.parent();
    }
    None
}

/// Whether the first real segment of an entry name is the metadata sentinel.
pub(crate) fn leads_with_metadata_dir(entry_path: &Path) -> bool {
    segments(entry_path)
        .find(|s| !s.is_empty() && *s != ".")
        .is_some_and(ziplift_fs::is_metadata_component)
}

fn segments(path: &Path) -> Box<dyn Iterator<Item = &OsStr> + '_> {
    match path.to_str() {
        Some(text) => Box::new(text.split(['/', '\\']).map(OsStr::new)),
        None => Box::new(path.iter()),
    }
}

fn is_rooted(path: &Path) -> bool {
    if path.has_root() || path.is_absolute() {
        return true;
    }
    if matches!(path.components().next(), Some(Component::Prefix(_))) {
        return true;
    }
    path.to_str()
        .is_some_and(|text| text.starts_with('/') || text.starts_with('\\'))
}

fn is_drive_prefix(segment: &OsStr) -> bool {
    match segment.as_encoded_bytes() {
        [letter, b':', ..] => letter.is_ascii_alphabetic(),
        _ => false,
    }
}

/// Resolve `.` and `..` lexically. Climbing past a root stays at the root.
fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::Normal(part) => result.push(part),
            Component::RootDir => result.push(Component::RootDir.as_os_str()),
            Component::Prefix(prefix) => result.push(prefix.as_os_str()),
            Component::CurDir => {}
        }
    }

    result
}
