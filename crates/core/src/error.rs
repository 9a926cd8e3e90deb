//! Error type shared by every stage of a mirror pass

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result alias used across `dirmirror-core`
pub type Result<T, E = MirrorError> = std::result::Result<T, E>;

/// Everything that can go wrong while fingerprinting, walking, copying or
/// reading the change log.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// An I/O operation on a specific path failed.
    #[error("failed to {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Directory traversal failed.
    #[error("failed to walk directory tree: {0}")]
    Walk(#[from] ignore::Error),

    /// A walked entry did not live under the root it was walked from.
    #[error("{} is outside of walk root {}", path.display(), root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// Source and destination disagree on whether a path is a file or a
    /// directory.
    #[error("{} is a {found} in the destination but a {expected} in the source", path.display())]
    KindMismatch {
        path: PathBuf,
        expected: &'static str,
        found: &'static str,
    },

    /// The source root disappeared between startup and the pass.
    #[error("source directory {} does not exist", .0.display())]
    MissingSource(PathBuf),

    /// The last line of the change log could not be parsed.
    #[error("malformed change log line {line:?}: {reason}")]
    LogParse { line: String, reason: String },

    /// The run configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MirrorError {
    pub(crate) fn io(op: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// True when the failure means the entry vanished after it was
    /// enumerated. Such entries are skipped instead of aborting the pass.
    #[must_use]
    pub fn is_vanished(&self) -> bool {
        match self {
            Self::Io { source, .. } => source.kind() == io::ErrorKind::NotFound,
            Self::Walk(err) => err
                .io_error()
                .is_some_and(|e| e.kind() == io::ErrorKind::NotFound),
            _ => false,
        }
    }

    #[must_use]
    pub fn is_log_parse(&self) -> bool {
        matches!(self, Self::LogParse { .. })
    }
}
