//! Directory inspection for extracted archive trees.
//!
//! - `tree.rs` - Directory-only hierarchy and its indented rendering
//! - `walk.rs` - Regular-file walk used by the uploader
//!
//! Both honour the resource-fork sentinel directory some archivers emit
//! (see [`METADATA_DIR`]); nothing under it is ever reported.

use std::ffi::OsStr;

pub use error::{Error, Result};
pub use tree::{DirNode, build_tree};
pub use walk::{FileWalk, WalkedFile, walk_files};

mod error;
mod tree;
mod walk;

/// Top-level directory macOS archivers use for resource-fork artifacts.
pub const METADATA_DIR: &str = "__MACOSX";

/// Returns `true` when a single path segment is the metadata sentinel.
pub fn is_metadata_component(name: &OsStr) -> bool {
    name == METADATA_DIR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_component() {
        assert!(is_metadata_component(OsStr::new("__MACOSX")));
        assert!(!is_metadata_component(OsStr::new("__macosx")));
        assert!(!is_metadata_component(OsStr::new("MACOSX")));
    }
}
