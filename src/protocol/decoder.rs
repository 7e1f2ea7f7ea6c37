//! Positional decoding of readings frames

use crate::error::FrameError;
use crate::types::{FieldKind, Reading, Schema, Value};
use std::collections::BTreeMap;

/// Binds readings frame values to a schema
///
/// `fields[i]` is decoded as `schema[i]`. Fewer values than schema fields is
/// accepted; trailing sensors the device omitted are simply absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadingDecoder;

impl ReadingDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode one readings frame
    pub fn decode<S: AsRef<str>>(&self, fields: &[S], schema: &Schema) -> Result<Reading, FrameError> {
        let mut values = BTreeMap::new();

        for (index, raw) in fields.iter().enumerate() {
            let raw = raw.as_ref();
            let spec = schema
                .get(index)
                .ok_or(FrameError::FieldCountExceedsSchema {
                    field_count: fields.len(),
                    schema_len: schema.len(),
                })?;

            let value = Self::coerce(raw, spec.kind).ok_or_else(|| FrameError::TypeCoercionFailed {
                field_name: spec.name.clone(),
                raw_value: raw.to_string(),
                expected_kind: spec.kind,
            })?;

            values.insert(spec.name.clone(), value);
        }

        Ok(Reading::new(values))
    }

    fn coerce(raw: &str, kind: FieldKind) -> Option<Value> {
        let raw = raw.trim();
        match kind {
            // `nan`/`inf` parse as f64 but cannot be recorded as JSON numbers
            FieldKind::Float => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Value::Float),
            FieldKind::Integer => raw.parse::<i64>().ok().map(Value::Integer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldSpec;

    fn schema() -> Schema {
        Schema::new(vec![
            FieldSpec::new("temp", FieldKind::Float),
            FieldSpec::new("count", FieldKind::Integer),
        ])
    }

    #[test]
    fn test_decode_reading() {
        let reading = ReadingDecoder::new().decode(&["21.5", "3"], &schema()).unwrap();
        assert_eq!(reading.len(), 2);
        assert_eq!(reading.get("temp"), Some(Value::Float(21.5)));
        assert_eq!(reading.get("count"), Some(Value::Integer(3)));
    }

    #[test]
    fn test_integer_accepted_for_float_field() {
        let reading = ReadingDecoder::new().decode(&["21", "3"], &schema()).unwrap();
        assert_eq!(reading.get("temp"), Some(Value::Float(21.0)));
    }

    #[test]
    fn test_coercion_failure_names_field() {
        let err = ReadingDecoder::new().decode(&["bad", "3"], &schema()).unwrap_err();
        assert_eq!(
            err,
            FrameError::TypeCoercionFailed {
                field_name: "temp".to_string(),
                raw_value: "bad".to_string(),
                expected_kind: FieldKind::Float,
            }
        );
    }

    #[test]
    fn test_float_rejected_for_integer_field() {
        let err = ReadingDecoder::new().decode(&["1.0", "3.5"], &schema()).unwrap_err();
        assert!(matches!(
            err,
            FrameError::TypeCoercionFailed { ref field_name, expected_kind: FieldKind::Integer, .. }
                if field_name == "count"
        ));
    }

    #[test]
    fn test_non_finite_floats_rejected() {
        for raw in ["nan", "inf", "-inf", "infinity", "NaN"] {
            let err = ReadingDecoder::new().decode(&[raw], &schema()).unwrap_err();
            assert_eq!(
                err,
                FrameError::TypeCoercionFailed {
                    field_name: "temp".to_string(),
                    raw_value: raw.to_string(),
                    expected_kind: FieldKind::Float,
                }
            );
        }
    }

    #[test]
    fn test_too_many_fields() {
        let err = ReadingDecoder::new()
            .decode(&["21.5", "3", "99"], &schema())
            .unwrap_err();
        assert_eq!(
            err,
            FrameError::FieldCountExceedsSchema {
                field_count: 3,
                schema_len: 2,
            }
        );
    }

    #[test]
    fn test_fewer_fields_than_schema() {
        let reading = ReadingDecoder::new().decode(&["21.5"], &schema()).unwrap();
        assert_eq!(reading.len(), 1);
        assert_eq!(reading.get("temp"), Some(Value::Float(21.5)));
        assert!(reading.get("count").is_none());
    }

    #[test]
    fn test_values_are_trimmed() {
        let reading = ReadingDecoder::new().decode(&[" 21.5 ", "3 "], &schema()).unwrap();
        assert_eq!(reading.get("count"), Some(Value::Integer(3)));
    }

    #[test]
    fn test_negative_values() {
        let reading = ReadingDecoder::new().decode(&["-4.25", "-12"], &schema()).unwrap();
        assert_eq!(reading.get("temp"), Some(Value::Float(-4.25)));
        assert_eq!(reading.get("count"), Some(Value::Integer(-12)));
    }
}
