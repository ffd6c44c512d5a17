use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use log::debug;
use serialport::{ClearBuffer, SerialPort};

use crate::ProtocolError;

/// A bidirectional text-line channel to the motion controller.
///
/// Dropping the transport closes the underlying link.
pub trait LineTransport: Send {
    /// Drop everything received but not yet read.
    fn discard_input(&mut self) -> io::Result<()>;

    /// Write `line` followed by a newline terminator.
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Read one line without its terminator.
    ///
    /// Waits at most `timeout`; returns `Ok(None)` if no complete line
    /// arrived in that window.
    fn read_line(&mut self, timeout: Duration) -> io::Result<Option<String>>;
}

/// [`LineTransport`] over a serial port.
pub struct SerialTransport {
    name: String,
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
}

impl SerialTransport {
    pub fn open(path: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self, ProtocolError> {
        let port = serialport::new(path, baud_rate)
            .timeout(read_timeout)
            .open()?;
        debug!("opened serial port {path} at {baud_rate} baud");
        Ok(Self::from_port(path, port))
    }

    /// Wrap an already configured port.
    pub fn from_port(name: impl Into<String>, port: Box<dyn SerialPort>) -> Self {
        Self {
            name: name.into(),
            port,
            pending: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=end).collect();
        let text = String::from_utf8_lossy(&raw);
        Some(text.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl LineTransport for SerialTransport {
    fn discard_input(&mut self) -> io::Result<()> {
        self.pending.clear();
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\n")?;
        self.port.flush()
    }

    fn read_line(&mut self, timeout: Duration) -> io::Result<Option<String>> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 256];
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            self.port.set_timeout(remaining)?;
            match self.port.read(&mut buf) {
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(e),
            }
        }
    }
}

/// Serial devices visible to the OS.
pub fn list_ports() -> Result<Vec<String>, ProtocolError> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
