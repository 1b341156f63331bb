//! Raw REPL state machine.
//!
//! A [`Session`] owns the link and tracks which mode the board's interpreter is
//! in. The only primitive it offers on top of mode changes is [`Session::exec`]:
//! send a code block, get back what it printed and the traceback, if any.
//!
//! ```text
//!  Interactive --enter_raw--> Raw --exec--> Raw --exit_raw--> Interactive
//!                              ^                   |
//!                              +---- enter_raw ----+  (after timeout/bad ack)
//! ```

use std::ops::{Deref, DerefMut};
use std::time::Instant;

use crate::config::ReplConfig;
use crate::constants::*;
use crate::error::{ProtocolError, ProtocolResult};
use crate::frame::{find_marker, ExecDecoder, ExecResult};
use crate::link::{is_timeout, ByteLink};

/// Size of the scratch buffer used for link reads.
const READ_BUF_SIZE: usize = 1024;

/// Interpreter mode as last driven by this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Human-facing line-editing console.
    Interactive,
    /// Machine-oriented raw REPL.
    Raw,
}

/// One connection to a board.
pub struct Session<L: ByteLink> {
    link: L,
    mode: Mode,
    /// False after any framing failure until raw mode is re-entered.
    synchronized: bool,
    config: ReplConfig,
}

impl<L: ByteLink> Session<L> {
    /// Create a session with default timing.
    ///
    /// The board is assumed to be in interactive mode.
    pub fn new(link: L) -> Self {
        Self::with_config(link, ReplConfig::default())
    }

    /// Create a session with explicit timing.
    pub fn with_config(link: L, config: ReplConfig) -> Self {
        Session {
            link,
            mode: Mode::Interactive,
            synchronized: false,
            config,
        }
    }

    /// Current mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// True if Exec may be called.
    pub fn is_ready(&self) -> bool {
        self.mode == Mode::Raw && self.synchronized
    }

    /// Timing configuration.
    pub fn config(&self) -> &ReplConfig {
        &self.config
    }

    /// Direct access to the link, bypassing the state machine.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Give up the session and return the link.
    pub fn into_link(self) -> L {
        self.link
    }

    /// Interrupt whatever is running and switch the board to raw mode.
    ///
    /// Safe to call in any state, including while a program is running or the
    /// session is already in raw mode.
    pub fn enter_raw(&mut self) -> ProtocolResult<()> {
        self.synchronized = false;
        self.link.set_read_timeout(self.config.poll_interval)?;

        log::debug!("sending {} interrupts", INTERRUPT_COUNT);
        self.send(&[CTRL_INTERRUPT; INTERRUPT_COUNT])?;
        self.drain_input()?;

        log::debug!("requesting raw mode");
        self.send(&[CTRL_ENTER_RAW])?;
        self.read_until_marker(RAW_BANNER, "raw REPL banner")?;

        self.mode = Mode::Raw;
        self.synchronized = true;
        log::debug!("raw mode entered");
        Ok(())
    }

    /// Return the board to interactive mode.
    ///
    /// Best effort: nothing is awaited and write failures are only logged.
    /// Does nothing if the session is already interactive.
    pub fn exit_raw(&mut self) {
        if self.mode == Mode::Interactive {
            return;
        }
        log::debug!("leaving raw mode");
        if let Err(e) = self.send(&[CTRL_EXIT_RAW]) {
            log::warn!("failed to send exit-raw byte: {}", e);
        }
        self.mode = Mode::Interactive;
        self.synchronized = false;
    }

    /// Execute a code block and return its output and traceback.
    ///
    /// A traceback is not an error at this level; see [`ExecResult::remote_error`].
    /// Any framing failure marks the session desynchronized.
    pub fn exec(&mut self, code: &[u8]) -> ProtocolResult<ExecResult> {
        if self.mode != Mode::Raw {
            return Err(ProtocolError::NotRaw);
        }
        if !self.synchronized {
            return Err(ProtocolError::Desynchronized);
        }
        if let Some(offset) = code.iter().position(|&b| is_reserved(b)) {
            return Err(ProtocolError::ReservedByte {
                byte: code[offset],
                offset,
            });
        }

        log::trace!("exec {} bytes of code", code.len());
        let result = self.exec_framed(code);
        match &result {
            Ok(r) => log::debug!(
                "exec complete: {} bytes output, remote error: {}",
                r.output.len(),
                r.remote_error.is_some()
            ),
            Err(e) if e.desynchronizes() => {
                log::warn!("exec failed, session desynchronized: {}", e);
                self.synchronized = false;
            }
            Err(_) => {}
        }
        result
    }

    /// Trigger a soft reset of the board.
    ///
    /// Must be in raw mode. The new prompt is not awaited; the session has to
    /// re-enter raw mode before any further Exec.
    pub fn soft_reboot(&mut self) -> ProtocolResult<()> {
        if self.mode != Mode::Raw {
            return Err(ProtocolError::NotRaw);
        }
        log::debug!("sending soft reboot");
        self.synchronized = false;
        self.send(&[CTRL_SOFT_REBOOT])
    }

    /// Enter raw mode and return a guard that leaves it again on drop.
    pub fn raw(&mut self) -> ProtocolResult<RawGuard<'_, L>> {
        self.enter_raw()?;
        Ok(RawGuard { session: self })
    }

    fn exec_framed(&mut self, code: &[u8]) -> ProtocolResult<ExecResult> {
        let mut frame = Vec::with_capacity(code.len() + 1);
        frame.extend_from_slice(code);
        frame.push(CTRL_EXECUTE);
        self.send(&frame)?;

        let deadline = Instant::now() + self.config.exec_timeout;
        let mut decoder = ExecDecoder::new();
        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            if let Some(result) = decoder.decode()? {
                return Ok(result);
            }
            let n = self.read_some(&mut buf, deadline, decoder.phase().waiting_for())?;
            decoder.push(&buf[..n]);
        }
    }

    fn send(&mut self, bytes: &[u8]) -> ProtocolResult<()> {
        self.link.write_all(bytes)?;
        self.link.flush()?;
        Ok(())
    }

    /// Read at least one byte, polling until `deadline`.
    ///
    /// The deadline holds even while bytes keep arriving, so a board that
    /// prints forever cannot stall the caller.
    fn read_some(
        &mut self,
        buf: &mut [u8],
        deadline: Instant,
        waiting_for: &'static str,
    ) -> ProtocolResult<usize> {
        loop {
            if Instant::now() >= deadline {
                return Err(ProtocolError::Timeout { waiting_for });
            }
            match self.link.read(buf) {
                Ok(0) => return Err(ProtocolError::EndOfStream),
                Ok(n) => return Ok(n),
                Err(e) if is_timeout(&e) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read and discard bytes until `marker` has been seen.
    fn read_until_marker(&mut self, marker: &[u8], waiting_for: &'static str) -> ProtocolResult<()> {
        let deadline = Instant::now() + self.config.banner_timeout;
        let mut seen: Vec<u8> = Vec::new();
        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            let n = self.read_some(&mut buf, deadline, waiting_for)?;
            seen.extend_from_slice(&buf[..n]);
            if let Some(end) = find_marker(&seen, marker) {
                if end < seen.len() {
                    log::trace!("{} bytes followed the {}", seen.len() - end, waiting_for);
                }
                return Ok(());
            }
            // Keep only a tail long enough to hold a marker split across reads.
            if seen.len() > marker.len() * 4 {
                let keep = seen.len() - marker.len();
                seen.drain(..keep);
            }
        }
    }

    /// Discard input until the link goes quiet or the drain budget runs out.
    fn drain_input(&mut self) -> ProtocolResult<()> {
        let deadline = Instant::now() + self.config.drain_timeout;
        let mut buf = [0u8; READ_BUF_SIZE];
        let mut discarded = 0usize;
        while Instant::now() < deadline {
            match self.link.read(&mut buf) {
                Ok(0) => return Err(ProtocolError::EndOfStream),
                Ok(n) => discarded += n,
                Err(e) if is_timeout(&e) => break,
                Err(e) => return Err(e.into()),
            }
        }
        if discarded > 0 {
            log::trace!("discarded {} stale bytes", discarded);
        }
        Ok(())
    }
}

/// Raw mode held for the lifetime of the guard.
///
/// Dereferences to the [`Session`]; dropping it issues ExitRaw on every path.
pub struct RawGuard<'a, L: ByteLink> {
    session: &'a mut Session<L>,
}

impl<L: ByteLink> Deref for RawGuard<'_, L> {
    type Target = Session<L>;

    fn deref(&self) -> &Self::Target {
        &*self.session
    }
}

impl<L: ByteLink> DerefMut for RawGuard<'_, L> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.session
    }
}

impl<L: ByteLink> Drop for RawGuard<'_, L> {
    fn drop(&mut self) {
        self.session.exit_raw();
    }
}
