//! Error handling for serial-telemetry
//!
//! Two families of errors live here:
//!
//! - [`FrameError`] - per-frame protocol errors. These are values: the reader
//!   loop logs them and moves on to the next line.
//! - [`TelemetryError`] - session-level errors (serial I/O, configuration).
//!   These end the session and are reported to whoever started it.

use crate::types::FieldKind;
use thiserror::Error;

/// Errors raised while parsing, registering or decoding a single frame
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Missing start/end marker, or no fields after the header
    #[error("Malformed frame ({reason}): {line:?}")]
    MalformedFrame { line: String, reason: &'static str },

    /// A format field used a type code other than `f` or `i`
    #[error("Unknown field type '{code}' in field spec {spec:?}")]
    UnknownFieldType { spec: String, code: String },

    /// A format field was not of the form `<type-code>:<name>`
    #[error("Malformed field spec {spec:?}")]
    MalformedFieldSpec { spec: String },

    /// A readings frame carried more values than the schema declares
    #[error("Received {field_count} values but schema only has {schema_len} fields")]
    FieldCountExceedsSchema { field_count: usize, schema_len: usize },

    /// A reading value could not be parsed as its declared kind
    #[error("Field '{field_name}': cannot parse {raw_value:?} as {expected_kind}")]
    TypeCoercionFailed {
        field_name: String,
        raw_value: String,
        expected_kind: FieldKind,
    },

    /// A frame header the router has no handler for
    #[error("Unknown frame header: {0:?}")]
    UnknownHeader(String),

    /// A readings frame arrived before any format frame
    #[error("No schema registered yet, readings frame discarded")]
    MissingSchema,
}

/// Main error type for session-level operations
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Errors reported by the serial port driver
    #[error("Serial error: {0}")]
    Serial(#[from] serialport::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// The link was used in a state that does not allow the operation
    #[error("Link error: {0}")]
    Link(String),

    /// The reader thread ended abnormally
    #[error("Reader thread panicked")]
    ReaderPanicked,

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<TelemetryError>,
    },
}

impl TelemetryError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        TelemetryError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for serial-telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| TelemetryError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| TelemetryError::from(e).with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, serialport::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| TelemetryError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| TelemetryError::from(e).with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TelemetryError::Link("port not open".to_string());
        assert_eq!(err.to_string(), "Link error: port not open");
    }

    #[test]
    fn test_error_with_context() {
        let err = TelemetryError::Config("bad baud".to_string());
        let with_ctx = err.with_context("Failed to load config");
        assert!(with_ctx.to_string().contains("Failed to load config"));
        assert!(with_ctx.to_string().contains("bad baud"));
    }

    #[test]
    fn test_type_coercion_display() {
        let err = FrameError::TypeCoercionFailed {
            field_name: "temp".to_string(),
            raw_value: "bad".to_string(),
            expected_kind: FieldKind::Float,
        };
        let text = err.to_string();
        assert!(text.contains("temp"));
        assert!(text.contains("\"bad\""));
        assert!(text.contains("float"));
    }
}
