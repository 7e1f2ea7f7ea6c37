//! SerialLink trait for a unified line-oriented device interface
//!
//! This module provides a common trait for the connection the reader loop
//! owns, so the same loop drives a real serial port or an in-memory mock.

use crate::config::ResetConfig;
use crate::error::Result;
use std::thread;

/// A point-to-point, line-oriented connection to the device
///
/// Implementations are used from exactly one thread at a time: the thread that
/// opened them, then the reader thread.
pub trait SerialLink: Send {
    /// Open the connection
    fn open(&mut self) -> Result<()>;

    /// Check if the connection is open
    fn is_open(&self) -> bool;

    /// Drive the DTR control line
    fn set_dtr(&mut self, level: bool) -> Result<()>;

    /// Drop any input received but not yet read, including partial lines
    fn discard_input(&mut self) -> Result<()>;

    /// Read one line, waiting at most the link's read timeout
    ///
    /// Returns `Ok(None)` when no complete line arrived in time. The line
    /// terminator is not included. Any error is fatal to the session.
    fn read_line(&mut self) -> Result<Option<String>>;

    /// Flush pending output
    fn flush(&mut self) -> Result<()>;

    /// Close the connection. Closing a closed link is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Human readable description for logs (e.g. "/dev/ttyACM0 @ 115200")
    fn description(&self) -> String;

    /// Reset the device by toggling DTR
    ///
    /// Boards with auto-reset circuitry reboot when DTR drops. Input that
    /// arrived before the reboot is discarded so the first line read belongs to
    /// the fresh boot (normally the format frame).
    fn reset_device(&mut self, reset: &ResetConfig) -> Result<()> {
        if !reset.enabled {
            return Ok(());
        }

        tracing::debug!("Resetting device on {}", self.description());
        self.set_dtr(false)?;
        thread::sleep(reset.low_duration());
        self.discard_input()?;
        self.set_dtr(true)?;
        thread::sleep(reset.settle_duration());
        Ok(())
    }
}
