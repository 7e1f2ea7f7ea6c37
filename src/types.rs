//! Core data types for serial-telemetry
//!
//! # Main Types
//!
//! - [`Frame`] - A structurally valid protocol message (header + fields)
//! - [`FieldKind`] / [`FieldSpec`] - One typed field declared by the device
//! - [`Schema`] - Ordered field declarations; position binds to reading values
//! - [`Value`] - A decoded sensor value (float or integer)
//! - [`Reading`] - One decoded sensor snapshot, keyed by field name
//! - [`ReaderState`] - Lifecycle state of the port reader

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A structurally valid frame: header plus at least one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// First segment between the markers
    pub header: String,
    /// Remaining segments, in wire order. Never empty.
    pub fields: Vec<String>,
}

/// Kind of value a schema field carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Type code `f`
    Float,
    /// Type code `i`
    Integer,
}

impl FieldKind {
    /// Map a wire type code to a kind
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "f" => Some(FieldKind::Float),
            "i" => Some(FieldKind::Integer),
            _ => None,
        }
    }

    /// The wire type code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            FieldKind::Float => "f",
            FieldKind::Integer => "i",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Float => write!(f, "float"),
            FieldKind::Integer => write!(f, "integer"),
        }
    }
}

/// A named, typed field declared by a format frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered field declarations. Index `i` binds to value `i` of a readings frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field at a position, if the schema is long enough
    pub fn get(&self, index: usize) -> Option<&FieldSpec> {
        self.fields.get(index)
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }
}

/// A decoded sensor value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
}

impl Value {
    /// Numeric value as f64, for consumers that don't care about the kind
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Float(v) => *v,
            Value::Integer(v) => *v as f64,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Float(_) => None,
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Value::Float(_) => FieldKind::Float,
            Value::Integer(_) => FieldKind::Integer,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
        }
    }
}

/// One decoded readings frame
///
/// Holds one entry per value actually present in the frame. A device that omits
/// trailing sensors produces a reading with fewer entries than the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Position of this reading in the session, starting at 0
    pub seq: u64,
    /// When the frame was decoded
    pub received_at: DateTime<Utc>,
    /// Sensor name to decoded value
    pub values: BTreeMap<String, Value>,
}

impl Reading {
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self {
            seq: 0,
            received_at: Utc::now(),
            values,
        }
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Lifecycle state of the port reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderState {
    /// No connection is held
    #[default]
    Closed,
    /// Connection opened, device reset handshake in progress
    Open,
    /// Read loop running
    Reading,
}

impl std::fmt::Display for ReaderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReaderState::Closed => write!(f, "Closed"),
            ReaderState::Open => write!(f, "Open"),
            ReaderState::Reading => write!(f, "Reading"),
        }
    }
}
