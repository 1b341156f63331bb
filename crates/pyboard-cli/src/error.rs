//! Errors surfaced to the command line.

use std::io;
use std::path::PathBuf;

use pyboard_fs::FsError;
use pyboard_repl::{ConnectError, ProtocolError};
use thiserror::Error;

/// Anything that makes a `pyboard` invocation fail.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("no device given; use --device or set PYBOARD_DEVICE")]
    NoDevice,

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Fs(#[from] FsError),

    #[error("failed to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Local terminal or stdout failure.
    #[error("console I/O failed: {0}")]
    Console(#[source] io::Error),
}

pub type CliResult<T> = Result<T, CliError>;
