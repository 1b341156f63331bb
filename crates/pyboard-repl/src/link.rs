//! Byte Link abstraction.
//!
//! A link is any duplex byte stream with a configurable read timeout: a serial
//! port, a TCP socket to a UART bridge, or an in-memory board for tests. A read
//! that times out must return an error of kind `TimedOut` or `WouldBlock`, never
//! `Ok(0)`; `Ok(0)` means the peer closed the stream.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::error::ConnectError;

/// A duplex byte stream to a board.
pub trait ByteLink: Read + Write + Send {
    /// Set how long a single `read` may block before reporting a timeout.
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Open a second handle onto the same stream.
    ///
    /// Used by interactive passthrough to read and write from different threads.
    fn try_clone_link(&self) -> io::Result<Box<dyn ByteLink>>;
}

impl<T: ByteLink + ?Sized> ByteLink for Box<T> {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        (**self).set_read_timeout(timeout)
    }

    fn try_clone_link(&self) -> io::Result<Box<dyn ByteLink>> {
        (**self).try_clone_link()
    }
}

impl ByteLink for TcpStream {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        TcpStream::set_read_timeout(self, Some(timeout))
    }

    fn try_clone_link(&self) -> io::Result<Box<dyn ByteLink>> {
        Ok(Box::new(self.try_clone()?))
    }
}

/// Returns true if an I/O error only means "no data yet".
pub fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Connect to a UART exposed over TCP (e.g. a simulator or ser2net bridge).
///
/// Accepts `tcp://host:port` or a bare `host:port`.
pub fn connect_tcp(target: &str) -> Result<TcpStream, ConnectError> {
    let addr = target.strip_prefix("tcp://").unwrap_or(target);
    let stream = TcpStream::connect(addr).map_err(|source| ConnectError {
        target: target.to_string(),
        source,
    })?;
    stream.set_nodelay(true).map_err(|source| ConnectError {
        target: target.to_string(),
        source,
    })?;
    log::debug!("connected to {} over TCP", addr);
    Ok(stream)
}

/// True if `target` names a TCP endpoint rather than a serial device.
pub fn is_tcp_target(target: &str) -> bool {
    if target.starts_with("tcp://") {
        return true;
    }
    match target.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty() && !host.contains('/') && !host.contains('\\') && port.parse::<u16>().is_ok()
        }
        None => false,
    }
}
