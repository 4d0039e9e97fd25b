/// Line buffering for decoded event-stream text.
use memchr::memchr;

/// Running text buffer that yields `\n`-terminated lines.
///
/// Text after the last newline stays buffered until its terminator arrives.
/// One trailing `\r` is removed from every yielded line.
///
/// The buffer also holds at most one pending remainder: a complete line whose
/// payload turned out to be an incomplete JSON fragment. It is logically
/// placed in front of all buffered text (with its newline restored) until the
/// caller takes it back.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: String,
    read_offset: usize,
    remainder: Option<String>,
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append decoded text.
    pub fn push(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// Extract the next complete line, if its terminator has arrived.
    pub fn next_line(&mut self) -> Option<String> {
        let rel_pos = memchr(b'\n', &self.buffer.as_bytes()[self.read_offset..])?;
        let line_end = self.read_offset + rel_pos;
        let mut line = &self.buffer[self.read_offset..line_end];
        if let Some(stripped) = line.strip_suffix('\r') {
            line = stripped;
        }
        let line = line.to_owned();
        self.read_offset = line_end + 1;
        self.compact();
        Some(line)
    }

    /// Put a line back in front of the buffered text for a later retry.
    pub fn requeue(&mut self, line: String) {
        debug_assert!(
            self.remainder.is_none(),
            "only one pending remainder may exist"
        );
        self.remainder = Some(line);
    }

    /// Take the pending remainder back out.
    pub fn take_remainder(&mut self) -> Option<String> {
        self.remainder.take()
    }

    #[must_use]
    pub fn has_remainder(&self) -> bool {
        self.remainder.is_some()
    }

    /// Unterminated text after the last yielded line.
    #[must_use]
    pub fn tail(&self) -> &str {
        &self.buffer[self.read_offset..]
    }

    /// Bytes held: the pending remainder (with its newline) plus the tail.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        let remainder = self.remainder.as_ref().map_or(0, |line| line.len() + 1);
        remainder + self.tail().len()
    }

    /// Everything still held, in stream order.
    #[must_use]
    pub fn contents(&self) -> String {
        let mut out = String::with_capacity(self.buffered_len());
        if let Some(line) = self.remainder.as_deref() {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(self.tail());
        out
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_offset = 0;
        self.remainder = None;
    }

    fn compact(&mut self) {
        if self.read_offset == self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
            return;
        }
        let should_compact = self.read_offset > 0
            && (self.read_offset >= self.buffer.len() / 2 || self.read_offset >= 8 * 1024);
        if should_compact {
            self.buffer.drain(..self.read_offset);
            self.read_offset = 0;
        }
    }
}
