//! Backend module for the serial connection
//!
//! This module owns everything that touches the device link. The read loop
//! runs in a separate thread so the session owner stays free to stop it.
//!
//! # Components
//!
//! - [`SerialLink`] - Trait over a line-oriented device connection
//! - [`SerialPortLink`] - Real serial port via the `serialport` crate
//! - [`MockLink`] - In-memory link for tests and dry runs
//! - [`PortReader`] - Owns the link and runs the read loop thread
//! - [`LineSink`] - Receives each raw line on the reader thread
//!
//! # Example
//!
//! ```ignore
//! use serial_telemetry::backend::{PortReader, SerialPortLink};
//! use serial_telemetry::config::AppConfig;
//!
//! let config = AppConfig::default();
//! let link = SerialPortLink::from_config(&config.link);
//! let mut reader = PortReader::new(Box::new(link), config.link.reset.clone(), sink);
//!
//! reader.start()?;
//! // ... lines arrive on `sink` ...
//! reader.stop()?;
//! ```

pub mod link;
pub mod mock_link;
pub mod reader;
pub mod serial_link;

pub use link::SerialLink;
pub use mock_link::{LinkEvent, MockLink, MockLinkHandle};
pub use reader::{LineSink, PortReader, ReaderEvent, StopHandle};
pub use serial_link::SerialPortLink;
