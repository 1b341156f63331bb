//! Error types for the raw REPL protocol.

use thiserror::Error;

/// Errors raised by the raw REPL state machine.
///
/// Apart from the precondition failures ([`ProtocolError::NotRaw`],
/// [`ProtocolError::ReservedByte`]) every variant leaves the link in an unknown
/// framing state; the session refuses further Exec calls until raw mode has
/// been entered again.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A terminator or marker did not arrive before the deadline.
    #[error("timeout waiting for {waiting_for}")]
    Timeout {
        /// What the reader was scanning for.
        waiting_for: &'static str,
    },

    /// The board answered a code block with something other than `OK`.
    #[error("unexpected acknowledgment {received:?} (expected \"OK\")")]
    UnexpectedAck {
        /// The two bytes actually received, lossily decoded.
        received: String,
    },

    /// Exec was called while the session is not in raw mode.
    #[error("session is not in raw REPL mode")]
    NotRaw,

    /// Code handed to Exec contains a byte reserved by the framing.
    #[error("code contains reserved control byte 0x{byte:02X} at offset {offset}")]
    ReservedByte {
        /// The offending byte.
        byte: u8,
        /// Position within the code block.
        offset: usize,
    },

    /// The session lost framing and must re-enter raw mode.
    #[error("session is desynchronized; raw mode must be re-entered")]
    Desynchronized,

    /// The link reported end-of-stream.
    #[error("link closed by the board")]
    EndOfStream,

    /// Underlying link I/O failure.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// True if this error means the framing can no longer be trusted.
    pub fn desynchronizes(&self) -> bool {
        !matches!(
            self,
            ProtocolError::NotRaw | ProtocolError::ReservedByte { .. } | ProtocolError::Desynchronized
        )
    }
}

/// The link to the board could not be established.
#[derive(Debug, Error)]
#[error("failed to connect to {target}: {source}")]
pub struct ConnectError {
    /// Device path or address that was being opened.
    pub target: String,
    /// Cause reported by the transport.
    #[source]
    pub source: std::io::Error,
}

/// Result type alias for raw REPL operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
