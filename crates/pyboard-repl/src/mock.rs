//! In-memory board.
//!
//! [`MockBoard`] speaks the raw REPL the way MicroPython firmware does (banner,
//! ack, terminators, prompt, interrupts, soft reset) and hands each executed
//! code block to an [`Interpreter`]. It lets the protocol engine and the layers
//! above it be exercised without hardware.
//!
//! Only built with the `mock` feature; enable it from `[dev-dependencies]`.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::constants::*;
use crate::link::ByteLink;

/// Printed when the board switches to raw mode.
const RAW_ENTRY: &[u8] = b"\r\nraw REPL; CTRL-B to exit\r\n>";
/// Printed when the board returns to the friendly REPL.
const FRIENDLY_BANNER: &[u8] =
    b"\r\nMicroPython v1.22.0 on 2024-01-01; mock board\r\nType \"help()\" for more information.\r\n>>> ";
/// Printed by a soft reset issued from raw mode (after the `OK`).
const SOFT_REBOOT_RAW: &[u8] = b"\r\nMPY: soft reboot\r\nraw REPL; CTRL-B to exit\r\n>";
/// Error segment produced when a hanging program is interrupted.
const KEYBOARD_INTERRUPT: &[u8] =
    b"Traceback (most recent call last):\r\n  File \"<stdin>\", line 1, in <module>\r\nKeyboardInterrupt: \r\n";

/// Outcome of executing one code block on the mock board.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Execution {
    /// Bytes the program printed.
    pub output: Vec<u8>,
    /// Traceback text; empty on success.
    pub error: String,
    /// If set, the program never finishes: `output` is emitted but no
    /// terminator follows until the board is interrupted.
    pub hang: bool,
}

impl Execution {
    /// Successful run that printed `output`.
    pub fn ok(output: impl Into<Vec<u8>>) -> Self {
        Execution {
            output: output.into(),
            ..Default::default()
        }
    }

    /// Run that raised an exception with the given traceback.
    pub fn error(traceback: impl Into<String>) -> Self {
        Execution {
            error: traceback.into(),
            ..Default::default()
        }
    }

    /// Run that prints `output` and then never returns.
    pub fn hang(output: impl Into<Vec<u8>>) -> Self {
        Execution {
            output: output.into(),
            hang: true,
            ..Default::default()
        }
    }
}

/// Executes code blocks received by a [`MockBoard`].
pub trait Interpreter: Send {
    /// Run `code` and describe what the board would send back.
    fn execute(&mut self, code: &str) -> Execution;
}

impl<F> Interpreter for F
where
    F: FnMut(&str) -> Execution + Send,
{
    fn execute(&mut self, code: &str) -> Execution {
        self(code)
    }
}

/// Interpreter mode of the mock board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockMode {
    /// Friendly `>>>` REPL.
    Friendly,
    /// Raw REPL.
    Raw,
}

struct BoardState {
    mode: MockMode,
    code: Vec<u8>,
    pending: VecDeque<u8>,
    hanging: bool,
    closed: bool,
    ack: [u8; 2],
    interpreter: Box<dyn Interpreter>,
    received: Vec<u8>,
    executed: Vec<String>,
    soft_reboots: usize,
}

impl BoardState {
    fn emit(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes.iter().copied());
    }

    fn handle_byte(&mut self, byte: u8) {
        match (self.mode, byte) {
            (_, CTRL_ENTER_RAW) => {
                self.mode = MockMode::Raw;
                self.code.clear();
                self.hanging = false;
                self.emit(RAW_ENTRY);
            }
            (MockMode::Raw, CTRL_EXIT_RAW) if !self.hanging => {
                self.mode = MockMode::Friendly;
                self.code.clear();
                self.emit(FRIENDLY_BANNER);
            }
            (_, CTRL_INTERRUPT) => {
                if self.hanging {
                    self.hanging = false;
                    self.emit(&[TERMINATOR]);
                    self.emit(KEYBOARD_INTERRUPT);
                    self.emit(&[TERMINATOR, RAW_PROMPT]);
                } else if self.mode == MockMode::Friendly {
                    self.emit(b"\r\n>>> ");
                }
                self.code.clear();
            }
            (MockMode::Raw, CTRL_EXECUTE) if !self.hanging => {
                if self.code.is_empty() {
                    self.soft_reboots += 1;
                    self.emit(EXEC_ACK);
                    self.emit(SOFT_REBOOT_RAW);
                } else {
                    self.execute();
                }
            }
            (MockMode::Raw, _) => {
                if !self.hanging {
                    self.code.push(byte);
                }
            }
            (MockMode::Friendly, _) => self.emit(&[byte]),
        }
    }

    fn execute(&mut self) {
        let code = String::from_utf8_lossy(&std::mem::take(&mut self.code)).into_owned();
        let ack = self.ack;
        self.emit(&ack);
        if &ack != EXEC_ACK {
            return;
        }
        let run = self.interpreter.execute(&code);
        self.executed.push(code);
        self.emit(&run.output);
        if run.hang {
            self.hanging = true;
            return;
        }
        self.emit(&[TERMINATOR]);
        self.emit(run.error.as_bytes());
        self.emit(&[TERMINATOR, RAW_PROMPT]);
    }
}

/// An in-memory board reachable through [`ByteLink`].
///
/// Clones share the same board, like two handles onto one serial port.
#[derive(Clone)]
pub struct MockBoard {
    state: Arc<Mutex<BoardState>>,
    read_timeout: Duration,
}

impl MockBoard {
    /// Board whose interpreter prints nothing for any code.
    pub fn new() -> Self {
        Self::with_interpreter(|_: &str| Execution::default())
    }

    /// Board that runs code blocks through `interpreter`.
    pub fn with_interpreter<I: Interpreter + 'static>(interpreter: I) -> Self {
        MockBoard {
            state: Arc::new(Mutex::new(BoardState {
                mode: MockMode::Friendly,
                code: Vec::new(),
                pending: VecDeque::new(),
                hanging: false,
                closed: false,
                ack: *EXEC_ACK,
                interpreter: Box::new(interpreter),
                received: Vec::new(),
                executed: Vec::new(),
                soft_reboots: 0,
            })),
            read_timeout: Duration::from_millis(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Current interpreter mode.
    pub fn mode(&self) -> MockMode {
        self.lock().mode
    }

    /// Every byte written to the board so far.
    pub fn received(&self) -> Vec<u8> {
        self.lock().received.clone()
    }

    /// Forget the recorded bytes.
    pub fn clear_received(&self) {
        self.lock().received.clear();
    }

    /// Code blocks executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    /// Number of soft resets performed.
    pub fn soft_reboots(&self) -> usize {
        self.lock().soft_reboots
    }

    /// Queue bytes as if the board had printed them unprompted.
    pub fn queue_output(&self, bytes: &[u8]) {
        self.lock().emit(bytes);
    }

    /// Replace the acknowledgment sent for code blocks.
    pub fn set_ack(&self, ack: [u8; 2]) {
        self.lock().ack = ack;
    }

    /// Close the board side; pending output is still delivered first.
    pub fn close(&self) {
        self.lock().closed = true;
    }
}

impl Default for MockBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for MockBoard {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        for attempt in 0..2 {
            {
                let mut state = self.lock();
                if !state.pending.is_empty() {
                    let n = buf.len().min(state.pending.len());
                    for (slot, byte) in buf.iter_mut().zip(state.pending.drain(..n)) {
                        *slot = byte;
                    }
                    return Ok(n);
                }
                if state.closed {
                    return Ok(0);
                }
            }
            if attempt == 0 {
                thread::sleep(self.read_timeout);
            }
        }
        Err(io::Error::from(io::ErrorKind::TimedOut))
    }
}

impl Write for MockBoard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        if state.closed {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        state.received.extend_from_slice(buf);
        for &byte in buf {
            state.handle_byte(byte);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ByteLink for MockBoard {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.read_timeout = timeout;
        Ok(())
    }

    fn try_clone_link(&self) -> io::Result<Box<dyn ByteLink>> {
        Ok(Box::new(self.clone()))
    }
}
