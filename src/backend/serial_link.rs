//! Real serial port link via the `serialport` crate

use crate::backend::link::SerialLink;
use crate::config::LinkConfig;
use crate::error::{Result, ResultExt, TelemetryError};
use crate::protocol::LineFramer;
use serialport::{ClearBuffer, SerialPort};
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

/// Size of a single read from the port
const READ_CHUNK: usize = 256;

/// A serial port opened by device path
pub struct SerialPortLink {
    path: String,
    baud_rate: u32,
    read_timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
    framer: LineFramer,
}

impl SerialPortLink {
    pub fn new(path: impl Into<String>, baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            read_timeout,
            port: None,
            framer: LineFramer::default(),
        }
    }

    pub fn from_config(config: &LinkConfig) -> Self {
        Self {
            framer: LineFramer::new(config.max_line_len),
            ..Self::new(config.port.clone(), config.baud_rate, config.read_timeout())
        }
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| TelemetryError::Link(format!("{} is not open", self.path)))
    }
}

/// A byte source whose blocking read timeout can be narrowed per call
trait TimedRead: Read {
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()>;
}

impl TimedRead for Box<dyn SerialPort> {
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.set_timeout(timeout).context("Failed to set read timeout")
    }
}

/// Read until a full line is framed or `deadline` passes
///
/// Every read is bounded by the time left, so a device trickling partial
/// lines cannot hold the caller past the deadline.
fn read_line_until<R: TimedRead>(
    port: &mut R,
    framer: &mut LineFramer,
    deadline: Instant,
) -> Result<Option<String>> {
    let mut buf = [0u8; READ_CHUNK];

    loop {
        if let Some(line) = framer.next_line() {
            return Ok(Some(line));
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(None);
        }
        port.set_read_timeout(remaining)?;

        match port.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(n) => framer.push(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::TimedOut => return Ok(None),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
}

impl SerialLink for SerialPortLink {
    fn open(&mut self) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }

        tracing::info!("Opening serial port: {} at {} baud", self.path, self.baud_rate);
        let port = serialport::new(&self.path, self.baud_rate)
            .timeout(self.read_timeout)
            .open()
            .with_context(|| format!("Failed to open {}", self.path))?;

        self.framer.reset();
        self.port = Some(port);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn set_dtr(&mut self, level: bool) -> Result<()> {
        self.port_mut()?
            .write_data_terminal_ready(level)
            .context("Failed to set DTR")
    }

    fn discard_input(&mut self) -> Result<()> {
        self.port_mut()?
            .clear(ClearBuffer::Input)
            .context("Failed to clear input buffer")?;
        self.framer.reset();
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let deadline = Instant::now() + self.read_timeout;
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| TelemetryError::Link(format!("{} is not open", self.path)))?;

        read_line_until(port, &mut self.framer, deadline)
            .map_err(|e| e.with_context(format!("Read error on {}", self.path)))
    }

    fn flush(&mut self) -> Result<()> {
        match self.port.as_mut() {
            Some(port) => port.flush().context("Failed to flush serial port"),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the handle closes the OS port
        if self.port.take().is_some() {
            tracing::info!("Closed serial port {}", self.path);
        }
        self.framer.reset();
        Ok(())
    }

    fn description(&self) -> String {
        format!("{} @ {}", self.path, self.baud_rate)
    }
}
