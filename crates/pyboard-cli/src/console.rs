//! Local terminal for `pyboard repl`.

use std::io::{self, Read};

use crossterm::terminal;

/// Ctrl-], the byte that ends an interactive session.
pub const ESCAPE: u8 = 0x1D;

/// Keeps the local terminal in raw mode until dropped.
pub struct RawTerminal {
    _private: (),
}

impl RawTerminal {
    pub fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawTerminal { _private: () })
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::warn!("failed to restore terminal mode: {}", e);
        }
    }
}

/// Console reader that reports end-of-stream at the first [`ESCAPE`] byte.
///
/// A terminal in raw mode never produces EOF on its own, so this is the only
/// way the operator can leave the passthrough.
pub struct EscapeReader<R> {
    inner: R,
    escaped: bool,
}

impl<R: Read> EscapeReader<R> {
    pub fn new(inner: R) -> Self {
        EscapeReader {
            inner,
            escaped: false,
        }
    }
}

impl<R: Read> Read for EscapeReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.escaped {
            return Ok(0);
        }
        let n = self.inner.read(buf)?;
        match buf[..n].iter().position(|&b| b == ESCAPE) {
            Some(at) => {
                self.escaped = true;
                Ok(at)
            }
            None => Ok(n),
        }
    }
}
