//! Listener that hands readings to another thread

use super::ReadingListener;
use crate::types::Reading;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};

/// Forwards readings over a bounded crossbeam channel
///
/// Uses `try_send` so a slow consumer can never stall the reader thread. When
/// the channel is full the reading is dropped and counted.
pub struct ChannelListener {
    sender: Sender<Reading>,
    dropped: AtomicU64,
}

impl ChannelListener {
    /// Create a listener and the receiving end of its channel
    pub fn new(capacity: usize) -> (Self, Receiver<Reading>) {
        let (sender, receiver) = bounded(capacity.max(1));
        (
            Self {
                sender,
                dropped: AtomicU64::new(0),
            },
            receiver,
        )
    }

    /// Readings dropped because the channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl ReadingListener for ChannelListener {
    fn accept(&self, reading: &Reading) -> anyhow::Result<()> {
        match self.sender.try_send(reading.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Channel full, dropped reading #{}", reading.seq);
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => {
                anyhow::bail!("reading receiver was dropped")
            }
        }
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}
