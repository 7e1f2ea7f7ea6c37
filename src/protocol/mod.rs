//! Serial frame protocol
//!
//! The device speaks a line-oriented text protocol:
//!
//! ```text
//! !log_format;f:temp;i:count|
//! !sensor_readings;21.5;3|
//! ```
//!
//! - `!` starts a frame, `|` ends it, `;` separates segments
//! - the first segment is the header, the rest are fields
//! - a `log_format` frame declares the schema as `<type-code>:<name>` pairs
//! - every later `sensor_readings` frame is decoded positionally against it
//!
//! # Components
//!
//! - [`LineFramer`] - splits the raw byte stream into lines
//! - [`FrameParser`] - validates a line and splits it into a [`Frame`](crate::types::Frame)
//! - [`SchemaRegistry`] - holds the schema declared by the last format frame
//! - [`ReadingDecoder`] - binds a readings frame to the schema

pub mod decoder;
pub mod frame;
pub mod line;
pub mod schema;

pub use decoder::ReadingDecoder;
pub use frame::{Delimiters, FrameParser};
pub use line::LineFramer;
pub use schema::SchemaRegistry;

/// Header of the frame that declares the schema
pub const FORMAT_HEADER: &str = "log_format";

/// Header of the frames that carry sensor values
pub const READINGS_HEADER: &str = "sensor_readings";
