//! Frame validation and splitting

use crate::error::FrameError;
use crate::types::Frame;

/// Protocol delimiters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    pub start: char,
    pub separator: char,
    pub end: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            start: '!',
            separator: ';',
            end: '|',
        }
    }
}

/// Stateless frame validator
///
/// A line is a frame only if, once trimmed, it begins with the start marker
/// *and* ends with the end marker, and the text between them holds a header
/// plus at least one field.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameParser {
    delimiters: Delimiters,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiters(delimiters: Delimiters) -> Self {
        Self { delimiters }
    }

    pub fn delimiters(&self) -> Delimiters {
        self.delimiters
    }

    /// Parse one line into a [`Frame`]
    pub fn parse(&self, line: &str) -> Result<Frame, FrameError> {
        let trimmed = line.trim();
        let malformed = |reason: &'static str| FrameError::MalformedFrame {
            line: trimmed.to_string(),
            reason,
        };

        let inner = trimmed
            .strip_prefix(self.delimiters.start)
            .ok_or_else(|| malformed("missing start marker"))?;
        let inner = inner
            .strip_suffix(self.delimiters.end)
            .ok_or_else(|| malformed("missing end marker"))?;

        let mut segments = inner.split(self.delimiters.separator);
        // split always yields at least one segment
        let header = segments.next().unwrap_or_default().to_string();
        let fields: Vec<String> = segments.map(str::to_string).collect();

        if fields.is_empty() {
            return Err(malformed("no fields after header"));
        }

        Ok(Frame { header, fields })
    }
}
