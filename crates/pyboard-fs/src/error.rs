//! Error types for filesystem operations.

use std::fmt;
use std::io;
use std::path::PathBuf;

use pyboard_repl::ProtocolError;
use thiserror::Error;

/// Classified filesystem failure reported by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsErrorKind {
    /// Path does not exist.
    NotFound,
    /// A path component is not a directory.
    NotADirectory,
    /// Directory still has entries.
    NotEmpty,
    /// Something already exists at the path.
    AlreadyExists,
    /// Any other `OSError`.
    Other,
}

impl fmt::Display for FsErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsErrorKind::NotFound => write!(f, "no such file or directory"),
            FsErrorKind::NotADirectory => write!(f, "not a directory"),
            FsErrorKind::NotEmpty => write!(f, "directory not empty"),
            FsErrorKind::AlreadyExists => write!(f, "already exists"),
            FsErrorKind::Other => write!(f, "filesystem error"),
        }
    }
}

/// Errors from filesystem operations and transfers.
#[derive(Debug, Error)]
pub enum FsError {
    /// Framing with the board broke; raw mode must be re-entered.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The generated code raised something other than a filesystem error.
    #[error("remote execution failed:\n{traceback}")]
    Remote {
        /// Traceback exactly as printed by the board.
        traceback: String,
    },

    /// The board reported a filesystem error.
    #[error("{path}: {kind} ({message})")]
    FileSystem {
        /// Classified kind.
        kind: FsErrorKind,
        /// Remote path the operation was applied to.
        path: String,
        /// The board's own error line, e.g. `OSError: [Errno 2] ENOENT`.
        message: String,
    },

    /// Output of a generated script could not be parsed.
    #[error("unexpected output from board: {detail}")]
    Decode {
        /// What was wrong.
        detail: String,
    },

    /// Local file I/O failed.
    #[error("{}: {source}", path.display())]
    Local {
        /// Local path involved.
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing to the caller's sink failed.
    #[error("failed to write output: {0}")]
    Sink(#[source] io::Error),

    /// A tree operation failed at a specific entry.
    #[error("{path}: {source}")]
    Entry {
        /// Path of the failing entry, relative to the tree root.
        path: String,
        #[source]
        source: Box<FsError>,
    },
}

impl FsError {
    /// Filesystem error kind, looking through [`FsError::Entry`] wrappers.
    pub fn kind(&self) -> Option<FsErrorKind> {
        match self {
            FsError::FileSystem { kind, .. } => Some(*kind),
            FsError::Entry { source, .. } => source.kind(),
            _ => None,
        }
    }

    /// True if this is (or wraps) a `NotFound` filesystem error.
    pub fn is_not_found(&self) -> bool {
        self.kind() == Some(FsErrorKind::NotFound)
    }

    /// Wrap a local I/O error with its path.
    pub(crate) fn local(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FsError::Local {
            path: path.into(),
            source,
        }
    }

    /// Attach the tree-relative path of the entry being processed.
    pub(crate) fn at_entry(self, path: &str) -> Self {
        FsError::Entry {
            path: path.to_string(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;
