//! Exec response decoding.
//!
//! The raw REPL has no length prefixes. A response to one code block is:
//!
//! ```text
//! +------+-------------+------+-------------+------+-----+
//! | "OK" | output ...  | 0x04 | error ...   | 0x04 | '>' |
//! +------+-------------+------+-------------+------+-----+
//! ```
//!
//! Every boundary is found by scanning for a fixed byte, so the decoder is a
//! small state machine fed with whatever the link delivers.

use bytes::{Buf, BytesMut};

use crate::constants::{EXEC_ACK, RAW_PROMPT, TERMINATOR};
use crate::error::{ProtocolError, ProtocolResult};

/// Initial buffer capacity; large enough for one hex-encoded transfer chunk.
const INITIAL_CAPACITY: usize = 2048;

/// Result of executing one code block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Everything the code printed, up to the first terminator.
    pub output: Vec<u8>,
    /// Traceback text, if the board raised an exception.
    pub remote_error: Option<String>,
}

impl ExecResult {
    /// Output decoded as UTF-8 (lossy).
    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    /// True if the board reported an exception.
    pub fn is_error(&self) -> bool {
        self.remote_error.is_some()
    }
}

/// Which part of the response the decoder is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecPhase {
    /// The two-byte `OK`.
    Ack,
    /// Output bytes up to the first terminator.
    Output,
    /// Error text up to the second terminator.
    Error,
    /// The raw prompt that follows the response.
    Prompt,
    /// Response fully decoded.
    Done,
}

impl ExecPhase {
    /// Human-readable description, used in timeout errors.
    pub fn waiting_for(&self) -> &'static str {
        match self {
            ExecPhase::Ack => "exec acknowledgment",
            ExecPhase::Output => "output terminator",
            ExecPhase::Error => "error terminator",
            ExecPhase::Prompt => "raw prompt",
            ExecPhase::Done => "nothing",
        }
    }
}

/// Incremental decoder for a single Exec response.
#[derive(Debug)]
pub struct ExecDecoder {
    buffer: BytesMut,
    phase: ExecPhase,
    output: Vec<u8>,
    error: Vec<u8>,
}

impl Default for ExecDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecDecoder {
    /// Create a decoder waiting for the acknowledgment.
    pub fn new() -> Self {
        ExecDecoder {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
            phase: ExecPhase::Ack,
            output: Vec::new(),
            error: Vec::new(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> ExecPhase {
        self.phase
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Advance as far as the buffered bytes allow.
    ///
    /// Returns `Ok(Some(result))` once the prompt after the second terminator
    /// has been seen, `Ok(None)` if more data is needed.
    pub fn decode(&mut self) -> ProtocolResult<Option<ExecResult>> {
        loop {
            match self.phase {
                ExecPhase::Ack => {
                    if self.buffer.len() < EXEC_ACK.len() {
                        return Ok(None);
                    }
                    let ack = self.buffer.split_to(EXEC_ACK.len());
                    if &ack[..] != EXEC_ACK {
                        return Err(ProtocolError::UnexpectedAck {
                            received: String::from_utf8_lossy(&ack).into_owned(),
                        });
                    }
                    self.phase = ExecPhase::Output;
                }
                ExecPhase::Output => match take_until(&mut self.buffer, TERMINATOR) {
                    Some(segment) => {
                        self.output.extend_from_slice(&segment);
                        self.phase = ExecPhase::Error;
                    }
                    None => {
                        self.output.extend_from_slice(&self.buffer.split());
                        return Ok(None);
                    }
                },
                ExecPhase::Error => match take_until(&mut self.buffer, TERMINATOR) {
                    Some(segment) => {
                        self.error.extend_from_slice(&segment);
                        self.phase = ExecPhase::Prompt;
                    }
                    None => {
                        self.error.extend_from_slice(&self.buffer.split());
                        return Ok(None);
                    }
                },
                ExecPhase::Prompt => {
                    if take_until(&mut self.buffer, RAW_PROMPT).is_none() {
                        self.buffer.clear();
                        return Ok(None);
                    }
                    self.phase = ExecPhase::Done;
                }
                ExecPhase::Done => {
                    if !self.buffer.is_empty() {
                        log::trace!("discarding {} bytes after raw prompt", self.buffer.len());
                        self.buffer.clear();
                    }
                    let error = std::mem::take(&mut self.error);
                    let remote_error = if error.is_empty() {
                        None
                    } else {
                        Some(String::from_utf8_lossy(&error).into_owned())
                    };
                    return Ok(Some(ExecResult {
                        output: std::mem::take(&mut self.output),
                        remote_error,
                    }));
                }
            }
        }
    }
}

/// Remove and return the bytes before the first `marker`, consuming the marker.
fn take_until(buffer: &mut BytesMut, marker: u8) -> Option<BytesMut> {
    let pos = buffer.iter().position(|&b| b == marker)?;
    let segment = buffer.split_to(pos);
    buffer.advance(1);
    Some(segment)
}

/// Find the end offset of `needle` in `haystack`, if present.
pub fn find_marker(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|start| start + needle.len())
}
