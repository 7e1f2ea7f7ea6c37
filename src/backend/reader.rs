//! Port reader thread
//!
//! The [`PortReader`] owns the [`SerialLink`] and runs the blocking read loop
//! on a dedicated thread. Every non-empty line is handed to a [`LineSink`] on
//! that same thread; there is no queue in between.
//!
//! # Lifecycle
//!
//! ```text
//! Closed --start()--> Open --reset done--> Reading --stop()/read error--> Closed
//! ```
//!
//! - `start()` opens the link and runs the device reset handshake on the
//!   calling thread, so open failures are returned directly. It then spawns the
//!   read loop. Calling it while already reading does nothing.
//! - `stop()` clears the run flag and joins the thread. The loop checks the flag
//!   between reads, so stop latency is at most one read timeout. Calling it
//!   while closed does nothing.
//! - A read error ends the session: the link is flushed and closed, the state
//!   returns to `Closed`, a [`ReaderEvent::Failed`] is published and the error
//!   is returned from the next `stop()`/`wait()`.

use crate::backend::link::SerialLink;
use crate::config::ResetConfig;
use crate::error::{Result, TelemetryError};
use crate::types::ReaderState;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Capacity of the reader event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Receiver of raw lines, called on the reader thread
pub trait LineSink: Send + Sync {
    fn on_line(&self, line: &str);
}

/// Lifecycle notifications published by the reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    /// The reader moved to a new state
    StateChanged(ReaderState),
    /// The session ended because of a connection error
    Failed(String),
}

/// Requests the read loop to exit without waiting for it
///
/// Safe to use from any thread, including from a listener running on the
/// reader thread itself.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// State shared between the reader and its thread
struct SharedState {
    state: Mutex<ReaderState>,
    events: Sender<ReaderEvent>,
    /// Used to evict the oldest event when nobody drains the channel
    backlog: Receiver<ReaderEvent>,
}

impl SharedState {
    fn set(&self, state: ReaderState) {
        match self.state.lock() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
        self.publish(ReaderEvent::StateChanged(state));
    }

    fn get(&self) -> ReaderState {
        match self.state.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Publish without blocking. When the channel is full the oldest event
    /// is dropped, so the latest state and failure are always retained.
    fn publish(&self, mut event: ReaderEvent) {
        loop {
            match self.events.try_send(event) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => return,
                Err(TrySendError::Full(rejected)) => {
                    let _ = self.backlog.try_recv();
                    event = rejected;
                }
            }
        }
    }
}

type SessionOutcome = (Box<dyn SerialLink>, Result<()>);

/// Owns the serial link and the thread reading from it
pub struct PortReader {
    link: Option<Box<dyn SerialLink>>,
    reset: ResetConfig,
    sink: Arc<dyn LineSink>,
    running: Arc<AtomicBool>,
    shared: Arc<SharedState>,
    events: Receiver<ReaderEvent>,
    handle: Option<JoinHandle<SessionOutcome>>,
}

impl PortReader {
    pub fn new(link: Box<dyn SerialLink>, reset: ResetConfig, sink: Arc<dyn LineSink>) -> Self {
        let (tx, rx) = bounded(EVENT_CHANNEL_CAPACITY);
        Self {
            link: Some(link),
            reset,
            sink,
            running: Arc::new(AtomicBool::new(false)),
            shared: Arc::new(SharedState {
                state: Mutex::new(ReaderState::Closed),
                events: tx,
                backlog: rx.clone(),
            }),
            events: rx,
            handle: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ReaderState {
        self.shared.get()
    }

    pub fn is_reading(&self) -> bool {
        self.state() == ReaderState::Reading
    }

    /// Receiver for lifecycle events
    ///
    /// The channel keeps the most recent events; older ones are evicted when it
    /// fills up and nobody is draining it.
    pub fn events(&self) -> Receiver<ReaderEvent> {
        self.events.clone()
    }

    /// Get a handle to stop the read loop
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: self.running.clone(),
        }
    }

    /// Open the link, reset the device and start the read loop
    pub fn start(&mut self) -> Result<()> {
        if self.is_reading() {
            tracing::debug!("start() ignored, reader already running");
            return Ok(());
        }

        // A previous session may have ended on its own (read error)
        if let Err(e) = self.reclaim() {
            tracing::debug!("Previous session had ended with: {}", e);
        }

        let mut link = self
            .link
            .take()
            .ok_or_else(|| TelemetryError::Link("serial link is unavailable".to_string()))?;

        if let Err(e) = link.open() {
            return self.abort_start(link, e);
        }
        self.shared.set(ReaderState::Open);

        if let Err(e) = link.reset_device(&self.reset) {
            return self.abort_start(link, e);
        }

        self.running.store(true, Ordering::SeqCst);
        self.shared.set(ReaderState::Reading);

        let sink = self.sink.clone();
        let running = self.running.clone();
        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name("serial-reader".to_string())
            .spawn(move || read_loop(link, sink, running, shared));

        match handle {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                self.shared.set(ReaderState::Closed);
                Err(TelemetryError::from(e).with_context("Failed to spawn reader thread"))
            }
        }
    }

    /// Stop the read loop and wait for the link to close
    ///
    /// Returns the error that ended the session, if it ended on its own.
    pub fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if self.handle.is_none() {
            return Ok(());
        }
        tracing::info!("Stopping reader");
        self.reclaim()
    }

    /// Block until the session ends (via a [`StopHandle`] or a read error)
    pub fn wait(&mut self) -> Result<()> {
        self.reclaim()
    }

    fn abort_start(&mut self, mut link: Box<dyn SerialLink>, e: TelemetryError) -> Result<()> {
        let _ = link.close();
        self.link = Some(link);
        tracing::error!("Failed to start reader: {}", e);
        self.shared.publish(ReaderEvent::Failed(e.to_string()));
        self.shared.set(ReaderState::Closed);
        Err(e)
    }

    /// Join the reader thread, if any, and take the link back
    fn reclaim(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        match handle.join() {
            Ok((link, outcome)) => {
                self.link = Some(link);
                outcome
            }
            Err(_) => {
                self.shared.set(ReaderState::Closed);
                Err(TelemetryError::ReaderPanicked)
            }
        }
    }
}

impl Drop for PortReader {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.stop();
        }
    }
}

fn read_loop(
    mut link: Box<dyn SerialLink>,
    sink: Arc<dyn LineSink>,
    running: Arc<AtomicBool>,
    shared: Arc<SharedState>,
) -> SessionOutcome {
    tracing::info!("Reader started on {}", link.description());

    let mut outcome = Ok(());
    while running.load(Ordering::SeqCst) {
        match link.read_line() {
            Ok(Some(line)) if !line.is_empty() => sink.on_line(&line),
            Ok(_) => {}
            Err(e) => {
                tracing::error!("Read failed on {}: {}", link.description(), e);
                outcome = Err(e);
                break;
            }
        }
    }
    running.store(false, Ordering::SeqCst);

    let flushed = link.flush();
    let closed = link.close();
    if outcome.is_ok() {
        outcome = flushed.and(closed);
    }

    if let Err(e) = &outcome {
        shared.publish(ReaderEvent::Failed(e.to_string()));
    }
    shared.set(ReaderState::Closed);
    tracing::info!("Reader stopped");

    (link, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock_link::{LinkEvent, MockLink};
    use std::io::ErrorKind;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct CollectSink {
        lines: Mutex<Vec<String>>,
    }

    impl CollectSink {
        fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }
    }

    impl LineSink for CollectSink {
        fn on_line(&self, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }
    }

    fn wait_for<F: Fn() -> bool>(cond: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn reader(timeout_ms: u64) -> (PortReader, crate::backend::MockLinkHandle, Arc<CollectSink>) {
        let (link, device) = MockLink::new(Duration::from_millis(timeout_ms));
        let sink = Arc::new(CollectSink::default());
        let reader = PortReader::new(Box::new(link), ResetConfig::disabled(), sink.clone());
        (reader, device, sink)
    }

    #[test]
    fn test_start_forwards_lines() {
        let (mut reader, device, sink) = reader(20);
        assert_eq!(reader.state(), ReaderState::Closed);

        reader.start().unwrap();
        assert_eq!(reader.state(), ReaderState::Reading);

        device.send_line("first");
        device.send_line("");
        device.send_line("second");
        assert!(wait_for(|| sink.lines().len() == 2));
        assert_eq!(sink.lines(), vec!["first", "second"]);

        reader.stop().unwrap();
        assert_eq!(reader.state(), ReaderState::Closed);
        assert_eq!(device.count(&LinkEvent::Closed), 1);
        assert_eq!(device.count(&LinkEvent::Flushed), 1);
    }

    #[test]
    fn test_start_twice_is_noop() {
        let (mut reader, device, _sink) = reader(20);
        reader.start().unwrap();
        reader.start().unwrap();
        assert_eq!(device.count(&LinkEvent::Opened), 1);
        reader.stop().unwrap();
    }

    #[test]
    fn test_stop_when_closed_is_noop() {
        let (mut reader, device, _sink) = reader(20);
        reader.stop().unwrap();
        reader.stop().unwrap();
        assert!(device.events().is_empty());
    }

    #[test]
    fn test_restart_after_stop() {
        let (mut reader, device, sink) = reader(20);
        reader.start().unwrap();
        reader.stop().unwrap();

        reader.start().unwrap();
        device.send_line("after restart");
        assert!(wait_for(|| sink.lines() == vec!["after restart"]));
        reader.stop().unwrap();
        assert_eq!(device.count(&LinkEvent::Opened), 2);
        assert_eq!(device.count(&LinkEvent::Closed), 2);
    }

    #[test]
    fn test_read_error_ends_session() {
        let (mut reader, device, _sink) = reader(20);
        let events = reader.events();
        reader.start().unwrap();

        device.fail_read(ErrorKind::BrokenPipe, "device unplugged");
        assert!(wait_for(|| reader.state() == ReaderState::Closed));

        let err = reader.wait().unwrap_err();
        assert!(err.to_string().contains("device unplugged"));
        assert_eq!(device.count(&LinkEvent::Closed), 1);

        let received: Vec<ReaderEvent> = events.try_iter().collect();
        assert!(received
            .iter()
            .any(|e| matches!(e, ReaderEvent::Failed(msg) if msg.contains("device unplugged"))));
        assert_eq!(
            received.last(),
            Some(&ReaderEvent::StateChanged(ReaderState::Closed))
        );

        // A new session can be started on the same link
        reader.start().unwrap();
        assert!(reader.is_reading());
        reader.stop().unwrap();
    }

    #[test]
    fn test_open_failure_is_returned() {
        let (mut reader, device, _sink) = reader(20);
        device.set_fail_open(true);
        assert!(reader.start().is_err());
        assert_eq!(reader.state(), ReaderState::Closed);

        device.set_fail_open(false);
        reader.start().unwrap();
        reader.stop().unwrap();
    }

    #[test]
    fn test_stop_handle_from_other_thread() {
        let (mut reader, _device, _sink) = reader(20);
        reader.start().unwrap();

        let handle = reader.stop_handle();
        thread::spawn(move || handle.stop()).join().unwrap();

        reader.wait().unwrap();
        assert_eq!(reader.state(), ReaderState::Closed);
    }

    #[test]
    fn test_undrained_events_keep_latest_failure() {
        let (mut reader, device, _sink) = reader(5);
        let events = reader.events();

        // Far more state changes than the channel holds, never drained
        for _ in 0..30 {
            reader.start().unwrap();
            reader.stop().unwrap();
        }

        reader.start().unwrap();
        device.fail_read(ErrorKind::BrokenPipe, "device unplugged");
        assert!(reader.wait().is_err());

        let received: Vec<ReaderEvent> = events.try_iter().collect();
        assert_eq!(received.len(), EVENT_CHANNEL_CAPACITY);
        assert!(received
            .iter()
            .any(|e| matches!(e, ReaderEvent::Failed(msg) if msg.contains("device unplugged"))));
        assert_eq!(
            received.last(),
            Some(&ReaderEvent::StateChanged(ReaderState::Closed))
        );
    }

    #[test]
    fn test_state_events_in_order() {
        let (mut reader, _device, _sink) = reader(20);
        let events = reader.events();
        reader.start().unwrap();
        reader.stop().unwrap();

        let received: Vec<ReaderEvent> = events.try_iter().collect();
        assert_eq!(
            received,
            vec![
                ReaderEvent::StateChanged(ReaderState::Open),
                ReaderEvent::StateChanged(ReaderState::Reading),
                ReaderEvent::StateChanged(ReaderState::Closed),
            ]
        );
    }
}
