use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_DEPTH: usize = 16;
pub const DEFAULT_NESTED_SUFFIX: &str = ".zip";

pub type ProgressCallback = Arc<dyn Fn(&ExtractProgress) + Send + Sync>;

#[derive(Clone)]
pub struct ExtractOptions {
    pub perm_strategy: PermissionStrategy,
    /// Deepest nesting level that may still be unpacked. The top-level
    /// archive is level 0; meeting a nested archive beyond this level fails
    /// with `NestingTooDeep`. Clear `nested_suffixes` to leave nested
    /// archives packed instead.
    pub max_depth: usize,
    /// File-name suffixes that mark an extracted file as a nested archive.
    pub nested_suffixes: Vec<String>,
    pub on_progress: Option<ProgressCallback>,
    pub cancel: CancellationToken,
}

/// Snapshot passed to the progress callback after every written entry.
#[derive(Clone, Debug)]
pub struct ExtractProgress {
    pub entries: u64,
    pub bytes: u64,
    pub current: PathBuf,
    pub depth: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            perm_strategy: PermissionStrategy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            nested_suffixes: vec![DEFAULT_NESTED_SUFFIX.to_string()],
            on_progress: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl ExtractOptions {
    pub fn permission_strategy(mut self, strategy: PermissionStrategy) -> Self {
        self.perm_strategy = strategy;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn nested_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nested_suffixes = suffixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Whether an extracted file should itself be unpacked.
    pub fn is_nested_archive(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.nested_suffixes
            .iter()
            .any(|suffix| !suffix.is_empty() && name.ends_with(suffix.as_str()))
    }

    pub(crate) fn report(&self, progress: ExtractProgress) {
        if let Some(ref callback) = self.on_progress {
            callback(&progress);
        }
    }
}

/// Permission application strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PermissionStrategy {
    /// Apply the archive's permission bits as stored.
    #[default]
    Preserve,
    /// Keep executable bits, otherwise make the file at least `0o644`.
    Standard,
    ReadOnly,
}

impl PermissionStrategy {
    /// Resolve the mode to apply (pure). `None` leaves the file as created.
    pub fn resolve(self, mode: Option<u32>) -> Option<u32> {
        match self {
            Self::Preserve => mode.map(|m| m & 0o7777),
            Self::Standard => Some(match mode {
                Some(m) if m & 0o111 != 0 => m & 0o7777,
                Some(m) => (m & 0o7777) | 0o644,
                None => 0o644,
            }),
            Self::ReadOnly => Some(0o444),
        }
    }

    /// Apply permissions to path (impure). A no-op off Unix.
    pub fn apply_to_path(self, path: &Path, mode: Option<u32>) -> io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(resolved) = self.resolve(mode) {
                std::fs::set_permissions(path, std::fs::Permissions::from_mode(resolved))?;
            }
        }
        #[cfg(not(unix))]
        {
            let _ = (path, mode);
        }
        Ok(())
    }
}
