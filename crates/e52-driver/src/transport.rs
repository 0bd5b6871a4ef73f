//! Byte transports for the module UART.
//!
//! [`Transport`] is the seam between the driver and the physical link.
//! [`SerialTransport`] talks to a real port; [`ScriptedTransport`] is an
//! in-memory implementation fed from a test or demo.

use std::io::{Read, Write};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};
use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, SerialPort};

use crate::error::TransportError;

/// Default bounded wait for a read attempt.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Byte-stream transport to the module.
///
/// Reads are bounded waits: an implementation blocks for at most its
/// configured timeout and reports `Ok(None)` when nothing arrived. Only real
/// stream failures surface as errors.
pub trait Transport: Send {
    /// Read whatever bytes are available into `buf`, waiting at most the
    /// configured read timeout. Returns the number of bytes read, or `None`
    /// if the wait elapsed with nothing to read.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<Option<usize>, TransportError>;

    /// Write all of `data` to the stream.
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Discard any bytes already received but not yet read.
    fn discard_input(&mut self) -> Result<(), TransportError>;
}

// ========== Serial Port Transport ==========

/// Serial port settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub path: String,
    /// Baud rate; the module default is 115200.
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// Bounded wait per read attempt.
    #[serde(default = "default_read_timeout")]
    pub read_timeout: Duration,
}

fn default_baud() -> u32 {
    115200
}

fn default_read_timeout() -> Duration {
    DEFAULT_READ_TIMEOUT
}

impl SerialConfig {
    /// Settings for the given port at the module's default baud rate.
    pub fn new(path: impl Into<String>) -> Self {
        SerialConfig {
            path: path.into(),
            baud: default_baud(),
            read_timeout: default_read_timeout(),
        }
    }
}

/// Transport over a physical serial port.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open the configured port.
    pub fn open(config: &SerialConfig) -> Result<Self, TransportError> {
        let port = serialport::new(config.path.as_str(), config.baud)
            .timeout(config.read_timeout)
            .open()?;
        Ok(SerialTransport { port })
    }
}

impl Transport for SerialTransport {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<Option<usize>, TransportError> {
        match self.port.read(buf) {
            Ok(0) => Ok(None),
            Ok(n) => Ok(Some(n)),
            Err(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}

// ========== Scripted Transport ==========

/// In-memory transport fed through a [`ScriptedHandle`].
pub struct ScriptedTransport {
    incoming: Receiver<Vec<u8>>,
    written: Sender<Vec<u8>>,
    read_timeout: Duration,
}

/// Test-side handle for a [`ScriptedTransport`].
pub struct ScriptedHandle {
    feed: Sender<Vec<u8>>,
    written: Receiver<Vec<u8>>,
}

impl ScriptedTransport {
    /// Create a transport and the handle that drives it.
    pub fn pair() -> (Self, ScriptedHandle) {
        Self::pair_with_timeout(Duration::from_millis(10))
    }

    /// Create a pair with an explicit read timeout.
    pub fn pair_with_timeout(read_timeout: Duration) -> (Self, ScriptedHandle) {
        let (feed_tx, feed_rx) = unbounded();
        let (written_tx, written_rx) = unbounded();
        let transport = ScriptedTransport {
            incoming: feed_rx,
            written: written_tx,
            read_timeout,
        };
        let handle = ScriptedHandle {
            feed: feed_tx,
            written: written_rx,
        };
        (transport, handle)
    }
}

impl Transport for ScriptedTransport {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<Option<usize>, TransportError> {
        match self.incoming.recv_timeout(self.read_timeout) {
            Ok(chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                Ok(Some(n))
            }
            // Disconnected means the handle is gone; report quiet, the
            // driver's shutdown flag ends the read loop.
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let _ = self.written.send(data.to_vec());
        Ok(())
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        loop {
            match self.incoming.try_recv() {
                Ok(_) => {}
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }
    }
}

impl ScriptedHandle {
    /// Queue bytes for the driver to read.
    pub fn feed(&self, data: &[u8]) {
        let _ = self.feed.send(data.to_vec());
    }

    /// Queue a complete line, terminated with `\r\n`.
    pub fn feed_line(&self, line: &str) {
        let mut data = line.as_bytes().to_vec();
        data.extend_from_slice(b"\r\n");
        let _ = self.feed.send(data);
    }

    /// Wait for the next write made by the driver.
    pub fn next_written(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.written.recv_timeout(timeout).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_read_and_write() {
        let (mut transport, handle) = ScriptedTransport::pair();
        handle.feed(b"hello");

        let mut buf = [0u8; 64];
        let n = transport.read_chunk(&mut buf).unwrap().unwrap();
        assert_eq!(&buf[..n], b"hello");

        transport.write_all(b"AT+RESET").unwrap();
        assert_eq!(
            handle.next_written(Duration::from_millis(100)).unwrap(),
            b"AT+RESET"
        );
    }

    #[test]
    fn test_scripted_read_timeout() {
        let (mut transport, _handle) = ScriptedTransport::pair();
        let mut buf = [0u8; 64];
        assert!(transport.read_chunk(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_scripted_discard_input() {
        let (mut transport, handle) = ScriptedTransport::pair();
        handle.feed(b"stale");
        transport.discard_input().unwrap();

        let mut buf = [0u8; 64];
        assert!(transport.read_chunk(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_serial_config_defaults() {
        let config = SerialConfig::new("/dev/ttyUSB0");
        assert_eq!(config.baud, 115200);
        assert_eq!(config.read_timeout, DEFAULT_READ_TIMEOUT);
    }
}
