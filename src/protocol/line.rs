//! Line framing over a raw byte stream
//!
//! Buffers bytes and yields a line whenever `\n` arrives. A `\r` directly before
//! the `\n` is dropped. Lines longer than the configured limit are discarded up
//! to the next newline so a device spewing garbage can't grow the buffer forever.

use std::collections::VecDeque;

/// Default maximum line length in bytes
pub const DEFAULT_MAX_LINE_LEN: usize = 1024;

#[derive(Debug)]
pub struct LineFramer {
    buffer: Vec<u8>,
    ready: VecDeque<String>,
    max_line_len: usize,
    /// Set while skipping the rest of an overlong line
    discarding: bool,
    discarded_lines: u64,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LEN)
    }
}

impl LineFramer {
    pub fn new(max_line_len: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(max_line_len.min(DEFAULT_MAX_LINE_LEN)),
            ready: VecDeque::new(),
            max_line_len: max_line_len.max(1),
            discarding: false,
            discarded_lines: 0,
        }
    }

    /// Feed raw bytes from the link
    pub fn push(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if b == b'\n' {
                if self.discarding {
                    self.discarding = false;
                } else {
                    if self.buffer.last() == Some(&b'\r') {
                        self.buffer.pop();
                    }
                    let line = String::from_utf8_lossy(&self.buffer).into_owned();
                    self.ready.push_back(line);
                }
                self.buffer.clear();
            } else if !self.discarding {
                self.buffer.push(b);
                if self.buffer.len() > self.max_line_len {
                    tracing::warn!(
                        "Discarding line longer than {} bytes",
                        self.max_line_len
                    );
                    self.buffer.clear();
                    self.discarding = true;
                    self.discarded_lines += 1;
                }
            }
        }
    }

    /// Next complete line, if any
    pub fn next_line(&mut self) -> Option<String> {
        self.ready.pop_front()
    }

    /// Bytes of an incomplete line held back
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn discarded_lines(&self) -> u64 {
        self.discarded_lines
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.ready.clear();
        self.discarding = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_simple() {
        let mut framer = LineFramer::default();
        framer.push(b"Hello\nWorld\n");
        assert_eq!(framer.next_line().as_deref(), Some("Hello"));
        assert_eq!(framer.next_line().as_deref(), Some("World"));
        assert_eq!(framer.next_line(), None);
    }

    #[test]
    fn test_lines_split_across_pushes() {
        let mut framer = LineFramer::default();
        framer.push(b"!sensor_rea");
        assert_eq!(framer.next_line(), None);
        assert_eq!(framer.pending_len(), 11);

        framer.push(b"dings;1|\n");
        assert_eq!(framer.next_line().as_deref(), Some("!sensor_readings;1|"));
        assert_eq!(framer.pending_len(), 0);
    }

    #[test]
    fn test_crlf_stripped() {
        let mut framer = LineFramer::default();
        framer.push(b"Test\r\n");
        assert_eq!(framer.next_line().as_deref(), Some("Test"));
    }

    #[test]
    fn test_empty_lines_are_yielded() {
        let mut framer = LineFramer::default();
        framer.push(b"\n\r\n");
        assert_eq!(framer.next_line().as_deref(), Some(""));
        assert_eq!(framer.next_line().as_deref(), Some(""));
    }

    #[test]
    fn test_overlong_line_discarded() {
        let mut framer = LineFramer::new(8);
        framer.push(b"0123456789abcdef\nok\n");
        assert_eq!(framer.next_line().as_deref(), Some("ok"));
        assert_eq!(framer.next_line(), None);
        assert_eq!(framer.discarded_lines(), 1);
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut framer = LineFramer::default();
        framer.push(&[b'!', 0xFF, b'|', b'\n']);
        let line = framer.next_line().unwrap();
        assert!(line.starts_with('!'));
        assert!(line.ends_with('|'));
    }
}
