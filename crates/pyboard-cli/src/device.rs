//! Opening the link named by `--device`.

use std::io::{self, Read, Write};
use std::time::Duration;

use pyboard_repl::{connect_tcp, is_tcp_target, ByteLink, ConnectError};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

/// Initial read timeout; the session replaces it before reading.
const OPEN_TIMEOUT: Duration = Duration::from_millis(20);

/// A serial port as a [`ByteLink`].
pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl Read for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl ByteLink for SerialLink {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port.set_timeout(timeout).map_err(io::Error::from)
    }

    fn try_clone_link(&self) -> io::Result<Box<dyn ByteLink>> {
        let port = self.port.try_clone().map_err(io::Error::from)?;
        Ok(Box::new(SerialLink { port }))
    }
}

/// Open `device`: a TCP endpoint for `tcp://host:port` or `host:port`,
/// otherwise a serial port at `baudrate`, 8N1.
pub fn open(device: &str, baudrate: u32) -> Result<Box<dyn ByteLink>, ConnectError> {
    if is_tcp_target(device) {
        tracing::debug!(device, "opening TCP link");
        return Ok(Box::new(connect_tcp(device)?));
    }

    tracing::debug!(device, baudrate, "opening serial port");
    let port = serialport::new(device, baudrate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(OPEN_TIMEOUT)
        .open()
        .map_err(|e| ConnectError {
            target: device.to_string(),
            source: e.into(),
        })?;
    Ok(Box::new(SerialLink { port }))
}
