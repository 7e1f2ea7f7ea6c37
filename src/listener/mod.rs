//! Reading listeners and their dispatch
//!
//! A listener is anything that implements [`ReadingListener`]. Listeners are
//! registered with a [`ListenerRegistry`] and notified synchronously, in
//! registration order, on the thread that decoded the reading (normally the
//! reader thread).
//!
//! A failing listener never affects the others: an `Err` or a panic from one
//! `accept` call is logged and counted, and delivery continues with the next
//! listener.
//!
//! # Provided listeners
//!
//! - [`TracingListener`] - logs each reading
//! - [`ChannelListener`] - forwards readings to another thread over a bounded channel
//! - [`JsonLinesRecorder`] - appends readings to a JSON Lines file
//! - [`FnListener`] - wraps a closure

pub mod channel;
pub mod recorder;

pub use channel::ChannelListener;
pub use recorder::JsonLinesRecorder;

use crate::types::Reading;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Consumer of decoded readings
#[cfg_attr(test, mockall::automock)]
pub trait ReadingListener: Send + Sync {
    /// Accept one reading. An error is logged by the registry and does not
    /// stop delivery to other listeners.
    fn accept(&self, reading: &Reading) -> anyhow::Result<()>;

    /// Name used in log messages
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Outcome of delivering one reading to every listener
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Ordered collection of listeners
///
/// Registration may happen from any thread, including while a notification is
/// in progress: `notify` works on a snapshot of the list taken under the read
/// lock, so a listener registered mid-notification receives the next reading.
///
/// The registry holds a strong `Arc` to every listener and never removes one,
/// so a registered listener stays alive (and keeps receiving readings) for as
/// long as the registry does. Callers that need to observe a listener keep
/// their own clone of the `Arc`.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn ReadingListener>>>,
    failures: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener. Notification order follows registration order.
    pub fn register(&self, listener: Arc<dyn ReadingListener>) {
        tracing::debug!("Registered listener {}", listener.name());
        match self.listeners.write() {
            Ok(mut guard) => guard.push(listener),
            Err(poisoned) => poisoned.into_inner().push(listener),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of failed `accept` calls since creation
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Deliver a reading to every listener, once each, in registration order
    pub fn notify(&self, reading: &Reading) -> NotifyReport {
        let mut report = NotifyReport::default();

        for listener in self.snapshot() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.accept(reading)));
            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!(
                        "Listener {} failed on reading #{}: {:#}",
                        listener.name(),
                        reading.seq,
                        e
                    );
                }
                Err(payload) => {
                    report.failed += 1;
                    tracing::error!(
                        "Listener {} panicked on reading #{}: {}",
                        listener.name(),
                        reading.seq,
                        panic_message(payload.as_ref())
                    );
                }
            }
        }

        if report.failed > 0 {
            self.failures
                .fetch_add(report.failed as u64, Ordering::Relaxed);
        }
        report
    }

    fn snapshot(&self) -> Vec<Arc<dyn ReadingListener>> {
        match self.listeners.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .field("failures", &self.failures())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Listener backed by a closure
pub struct FnListener<F> {
    name: &'static str,
    f: F,
}

impl<F> FnListener<F>
where
    F: Fn(&Reading) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> ReadingListener for FnListener<F>
where
    F: Fn(&Reading) -> anyhow::Result<()> + Send + Sync,
{
    fn accept(&self, reading: &Reading) -> anyhow::Result<()> {
        (self.f)(reading)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Logs every reading at info level
#[derive(Debug, Default)]
pub struct TracingListener;

impl ReadingListener for TracingListener {
    fn accept(&self, reading: &Reading) -> anyhow::Result<()> {
        let values = reading
            .values
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!("reading #{} {}", reading.seq, values);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}
