use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::is_metadata_component;

/// A directory and its sub-directories, as found by a single scan.
///
/// The root carries the path it was built from; descendants carry their
/// own segment name. Children keep `read_dir` order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirNode {
    pub name: PathBuf,
    pub children: Vec<DirNode>,
}

impl DirNode {
    pub fn new(name: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Look up a direct child by segment name.
    pub fn child(&self, name: impl AsRef<Path>) -> Option<&DirNode> {
        let name = name.as_ref();
        self.children.iter().find(|c| c.name == name)
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(DirNode::count).sum::<usize>()
    }

    /// Longest parent-to-leaf distance; a node without children has depth 0.
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|c| c.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Write one line per node, two spaces of indent per level, depth first.
    pub fn write_to<W: Write>(&self, out: &mut W, depth: usize) -> io::Result<()> {
        write!(out, "{}", Indented(self, depth))
    }
}

/// A node rendered as if it sat `depth` levels down.
struct Indented<'a>(&'a DirNode, usize);

impl fmt::Display for Indented<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Indented(node, depth) = *self;
        writeln!(f, "{:indent$}{}", "", node.name.display(), indent = depth * 2)?;
        for child in &node.children {
            Indented(child, depth + 1).fmt(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for DirNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Indented(self, 0).fmt(f)
    }
}

/// Scan `root` recursively and return its directory hierarchy.
///
/// Files are ignored, symlinked directories are not followed, and the
/// metadata sentinel is skipped at every level.
pub fn build_tree(root: impl AsRef<Path>) -> Result<DirNode> {
    let root = root.as_ref();
    build_node(root, root.to_path_buf())
}

fn build_node(path: &Path, name: PathBuf) -> Result<DirNode> {
    let read_error = |source| Error::DirectoryRead {
        path: path.to_path_buf(),
        source,
    };

    let mut node = DirNode::new(name);
    for entry in fs::read_dir(path).map_err(read_error)? {
        let entry = entry.map_err(read_error)?;
        let file_type = entry.file_type().map_err(read_error)?;
        if !file_type.is_dir() {
            continue;
        }

        let segment = entry.file_name();
        if is_metadata_component(&segment) {
            tracing::debug!(path = %entry.path().display(), "skipping metadata directory");
            continue;
        }

        node.children
            .push(build_node(&entry.path(), PathBuf::from(segment))?);
    }

    Ok(node)
}
