//! In-memory link for testing without hardware
//!
//! [`MockLink`] behaves like a serial port whose "device" is driven from a
//! [`MockLinkHandle`]: the handle feeds bytes, lines or read errors, and records
//! what the reader did to the link (open, DTR toggles, close).
//!
//! # Example
//!
//! ```ignore
//! let (link, device) = MockLink::new(Duration::from_millis(50));
//! let mut controller = Controller::new(&config, Box::new(link));
//! controller.start()?;
//! device.send_line("!log_format;f:temp;i:count|");
//! device.send_line("!sensor_readings;21.5;3|");
//! ```

use crate::backend::link::SerialLink;
use crate::error::{Result, TelemetryError};
use crate::protocol::LineFramer;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Something the mock device does to the link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Opened,
    Dtr(bool),
    InputDiscarded,
    Flushed,
    Closed,
}

#[derive(Debug)]
enum MockInput {
    Bytes(Vec<u8>),
    Error(ErrorKind, String),
}

#[derive(Debug, Default)]
struct MockShared {
    events: Mutex<Vec<LinkEvent>>,
    fail_open: AtomicBool,
}

impl MockShared {
    fn record(&self, event: LinkEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Mock serial link
pub struct MockLink {
    input: Receiver<MockInput>,
    read_timeout: Duration,
    framer: LineFramer,
    open: bool,
    shared: Arc<MockShared>,
}

/// Device side of a [`MockLink`]
#[derive(Clone)]
pub struct MockLinkHandle {
    input: Sender<MockInput>,
    shared: Arc<MockShared>,
}

impl MockLink {
    /// Create a link and the handle that drives it
    pub fn new(read_timeout: Duration) -> (Self, MockLinkHandle) {
        let (tx, rx) = unbounded();
        let shared = Arc::new(MockShared::default());
        let link = Self {
            input: rx,
            read_timeout,
            framer: LineFramer::default(),
            open: false,
            shared: shared.clone(),
        };
        (link, MockLinkHandle { input: tx, shared })
    }
}

impl MockLinkHandle {
    /// Send raw bytes as if they arrived on the wire
    pub fn send_bytes(&self, bytes: &[u8]) {
        let _ = self.input.send(MockInput::Bytes(bytes.to_vec()));
    }

    /// Send a line, appending the terminator
    pub fn send_line(&self, line: &str) {
        let mut bytes = line.as_bytes().to_vec();
        bytes.extend_from_slice(b"\r\n");
        let _ = self.input.send(MockInput::Bytes(bytes));
    }

    /// Make the next read fail with an I/O error (e.g. device unplugged)
    pub fn fail_read(&self, kind: ErrorKind, message: &str) {
        let _ = self.input.send(MockInput::Error(kind, message.to_string()));
    }

    /// Make subsequent `open` calls fail
    pub fn set_fail_open(&self, fail: bool) {
        self.shared.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Everything done to the link so far
    pub fn events(&self) -> Vec<LinkEvent> {
        match self.shared.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self, event: &LinkEvent) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }
}

impl SerialLink for MockLink {
    fn open(&mut self) -> Result<()> {
        if self.shared.fail_open.load(Ordering::SeqCst) {
            return Err(TelemetryError::Io(std::io::Error::new(
                ErrorKind::NotFound,
                "mock device not present",
            )));
        }
        if !self.open {
            self.open = true;
            self.framer.reset();
            self.shared.record(LinkEvent::Opened);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn set_dtr(&mut self, level: bool) -> Result<()> {
        self.shared.record(LinkEvent::Dtr(level));
        Ok(())
    }

    fn discard_input(&mut self) -> Result<()> {
        while self.input.try_recv().is_ok() {}
        self.framer.reset();
        self.shared.record(LinkEvent::InputDiscarded);
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        if !self.open {
            return Err(TelemetryError::Link("mock link is not open".to_string()));
        }

        let deadline = Instant::now() + self.read_timeout;
        loop {
            if let Some(line) = self.framer.next_line() {
                return Ok(Some(line));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            match self.input.recv_timeout(remaining) {
                Ok(MockInput::Bytes(bytes)) => self.framer.push(&bytes),
                Ok(MockInput::Error(kind, message)) => {
                    return Err(TelemetryError::Io(std::io::Error::new(kind, message)))
                }
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    // Device side gone; behave like a silent line
                    std::thread::sleep(remaining);
                    return Ok(None);
                }
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.shared.record(LinkEvent::Flushed);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.shared.record(LinkEvent::Closed);
        }
        Ok(())
    }

    fn description(&self) -> String {
        "mock".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResetConfig;

    #[test]
    fn test_read_lines() {
        let (mut link, device) = MockLink::new(Duration::from_millis(20));
        link.open().unwrap();

        device.send_bytes(b"!a;1|\n!b;");
        device.send_bytes(b"2|\n");

        assert_eq!(link.read_line().unwrap().as_deref(), Some("!a;1|"));
        assert_eq!(link.read_line().unwrap().as_deref(), Some("!b;2|"));
        assert_eq!(link.read_line().unwrap(), None);
    }

    #[test]
    fn test_read_timeout_is_bounded() {
        let (mut link, _device) = MockLink::new(Duration::from_millis(30));
        link.open().unwrap();

        let start = Instant::now();
        assert_eq!(link.read_line().unwrap(), None);
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_read_error() {
        let (mut link, device) = MockLink::new(Duration::from_millis(20));
        link.open().unwrap();
        device.fail_read(ErrorKind::BrokenPipe, "unplugged");
        assert!(matches!(link.read_line(), Err(TelemetryError::Io(_))));
    }

    #[test]
    fn test_reset_handshake_sequence() {
        let (mut link, device) = MockLink::new(Duration::from_millis(20));
        link.open().unwrap();
        device.send_line("stale boot noise");

        let reset = ResetConfig {
            enabled: true,
            low_ms: 1,
            settle_ms: 1,
        };
        link.reset_device(&reset).unwrap();

        assert_eq!(
            device.events(),
            vec![
                LinkEvent::Opened,
                LinkEvent::Dtr(false),
                LinkEvent::InputDiscarded,
                LinkEvent::Dtr(true),
            ]
        );
        // Stale input was discarded
        assert_eq!(link.read_line().unwrap(), None);
    }

    #[test]
    fn test_disabled_reset_does_nothing() {
        let (mut link, device) = MockLink::new(Duration::from_millis(20));
        link.open().unwrap();
        link.reset_device(&ResetConfig::disabled()).unwrap();
        assert_eq!(device.events(), vec![LinkEvent::Opened]);
    }

    #[test]
    fn test_fail_open() {
        let (mut link, device) = MockLink::new(Duration::from_millis(20));
        device.set_fail_open(true);
        assert!(link.open().is_err());
        assert!(!link.is_open());
    }
}
