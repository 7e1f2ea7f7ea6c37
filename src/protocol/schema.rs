//! Schema registration from format frames
//!
//! The device sends a format frame once after every reboot. Each field is a
//! `<type-code>:<name>` pair and the field order is the binding contract for all
//! later readings frames. A new format frame replaces the schema entirely.
//!
//! The registry is written only by the reader thread but may be read from any
//! thread, so the current schema sits behind an `RwLock` and is handed out as an
//! `Arc` snapshot. A snapshot stays valid even after the schema is replaced.

use crate::error::FrameError;
use crate::types::{FieldKind, FieldSpec, Schema};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Holds the schema declared by the most recent format frame
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    current: RwLock<Option<Arc<Schema>>>,
    generation: AtomicU64,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a single `<type-code>:<name>` field spec
    pub fn parse_field_spec(spec: &str) -> Result<FieldSpec, FrameError> {
        let (code, name) = spec
            .trim()
            .split_once(':')
            .ok_or_else(|| FrameError::MalformedFieldSpec {
                spec: spec.to_string(),
            })?;

        let kind = FieldKind::from_code(code).ok_or_else(|| FrameError::UnknownFieldType {
            spec: spec.to_string(),
            code: code.to_string(),
        })?;

        if name.is_empty() {
            return Err(FrameError::MalformedFieldSpec {
                spec: spec.to_string(),
            });
        }

        Ok(FieldSpec::new(name, kind))
    }

    /// Build a schema from format frame fields and make it current
    ///
    /// Nothing changes if any field is invalid; the previous schema is kept.
    pub fn register<S: AsRef<str>>(&self, fields: &[S]) -> Result<Arc<Schema>, FrameError> {
        let specs = fields
            .iter()
            .map(|f| Self::parse_field_spec(f.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let schema = Arc::new(Schema::new(specs));
        self.store(Some(schema.clone()));
        self.generation.fetch_add(1, Ordering::SeqCst);

        tracing::info!(
            "Registered schema with {} fields: [{}]",
            schema.len(),
            schema
                .iter()
                .map(|f| format!("{}:{}", f.kind.code(), f.name))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(schema)
    }

    /// Snapshot of the current schema, `None` before the first registration
    pub fn current(&self) -> Option<Arc<Schema>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of successful registrations so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Forget the current schema
    pub fn clear(&self) {
        self.store(None);
    }

    fn store(&self, schema: Option<Arc<Schema>>) {
        match self.current.write() {
            Ok(mut guard) => *guard = schema,
            Err(poisoned) => *poisoned.into_inner() = schema,
        }
    }
}
