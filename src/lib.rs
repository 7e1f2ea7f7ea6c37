//! # serial-telemetry: self-describing serial frame logger
//!
//! Reads text frames from a serial-attached microcontroller, learns the layout
//! of its readings from a format frame, decodes every readings frame into a
//! typed [`Reading`] and hands it to the registered listeners.
//!
//! ## Wire Format
//!
//! One frame per line: `!<header>;<field>;<field>...|`
//!
//! - `!log_format;f:temp;i:count|` declares the schema (`f` float, `i` integer)
//! - `!sensor_readings;21.5;3|` carries values in schema order
//!
//! ## Architecture
//!
//! - **Backend**: [`backend::PortReader`] owns the link and reads lines in a
//!   separate thread
//! - **Protocol**: frame parsing, the schema registry and value decoding
//! - **Listeners**: fan-out of readings to logging, recording or channels
//! - **Controller**: glues the above into one start/stop session
//!
//! ## Example
//!
//! ```ignore
//! use serial_telemetry::{config::AppConfig, listener::TracingListener, Controller};
//! use std::sync::Arc;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut config = AppConfig::default();
//!     config.link.port = "/dev/ttyACM0".to_string();
//!
//!     let mut controller = Controller::from_config(&config)?;
//!     controller.register_listener(Arc::new(TracingListener));
//!
//!     controller.start()?;
//!     std::thread::sleep(std::time::Duration::from_secs(15));
//!     controller.stop()?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod listener;
pub mod protocol;
pub mod types;

// Re-export commonly used types
pub use backend::{MockLink, PortReader, SerialLink, SerialPortLink};
pub use config::AppConfig;
pub use controller::{Controller, FrameRouter, RouterStats};
pub use error::{FrameError, Result, TelemetryError};
pub use listener::{ListenerRegistry, ReadingListener};
pub use protocol::{FrameParser, ReadingDecoder, SchemaRegistry};
pub use types::{FieldKind, Frame, Reading, ReaderState, Schema, Value};
