//! Interactive passthrough.
//!
//! Splices a local console onto the link without touching the raw REPL state
//! machine. Two copy loops run on their own threads; the first one to reach
//! end-of-stream ends the passthrough. No byte is interpreted in either
//! direction.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};

use crate::link::{is_timeout, ByteLink};

/// Size of the copy buffers.
const COPY_BUF_SIZE: usize = 1024;

/// How often the board side checks whether the console side has finished.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Which side ended the passthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassthroughEnd {
    /// The console input reached end-of-stream.
    ConsoleClosed,
    /// The board closed the link.
    LinkClosed,
}

/// Copy `console_in` to the link and the link to `console_out` until either
/// input reaches end-of-stream.
///
/// The console side may stay blocked in `read` after the link closes; that
/// thread is left to finish on its own.
pub fn passthrough<L, R, W>(link: L, console_in: R, console_out: W) -> io::Result<PassthroughEnd>
where
    L: ByteLink + 'static,
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let mut board_rx = link.try_clone_link()?;
    board_rx.set_read_timeout(POLL_INTERVAL)?;
    let stop = Arc::new(AtomicBool::new(false));
    let (done_tx, done_rx) = bounded::<io::Result<PassthroughEnd>>(2);

    let board_to_console = {
        let stop = stop.clone();
        let done_tx = done_tx.clone();
        thread::Builder::new()
            .name("passthrough-board".to_string())
            .spawn(move || copy_board_to_console(board_rx, console_out, &stop, done_tx))?
    };

    thread::Builder::new()
        .name("passthrough-console".to_string())
        .spawn(move || copy_console_to_board(console_in, link, done_tx))?;

    let first = done_rx
        .recv()
        .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "passthrough threads vanished"))?;
    stop.store(true, Ordering::SeqCst);
    if board_to_console.join().is_err() {
        log::warn!("board-to-console thread panicked");
    }
    log::debug!("passthrough finished: {:?}", first);
    first
}

fn copy_board_to_console<W: Write>(
    mut board: Box<dyn ByteLink>,
    mut console: W,
    stop: &AtomicBool,
    done: Sender<io::Result<PassthroughEnd>>,
) {
    let mut buf = [0u8; COPY_BUF_SIZE];
    let outcome = loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        match board.read(&mut buf) {
            Ok(0) => break Ok(PassthroughEnd::LinkClosed),
            Ok(n) => {
                if let Err(e) = console.write_all(&buf[..n]).and_then(|_| console.flush()) {
                    break Err(e);
                }
            }
            Err(e) if is_timeout(&e) => continue,
            Err(e) => break Err(e),
        }
    };
    let _ = done.send(outcome);
}

fn copy_console_to_board<R: Read, L: ByteLink>(
    mut console: R,
    mut board: L,
    done: Sender<io::Result<PassthroughEnd>>,
) {
    let mut buf = [0u8; COPY_BUF_SIZE];
    let outcome = loop {
        match console.read(&mut buf) {
            Ok(0) => break Ok(PassthroughEnd::ConsoleClosed),
            Ok(n) => {
                if let Err(e) = board.write_all(&buf[..n]).and_then(|_| board.flush()) {
                    break Err(e);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => break Err(e),
        }
    };
    let _ = done.send(outcome);
}
