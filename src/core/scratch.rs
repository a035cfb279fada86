//! Growable scratch buffer used to clean strings before they are embedded in
//! SQL text.
//!
//! Every cleaning call overwrites the buffer, so the returned `&str` borrows the
//! buffer and is only usable until the next call.
use tracing::trace;

const INITIAL_CAPACITY: usize = 0x200;

#[derive(Debug)]
pub struct ScratchBuffer {
    buf: String,
}

impl Default for ScratchBuffer {
    fn default() -> Self {
        ScratchBuffer::new()
    }
}

impl ScratchBuffer {
    pub fn new() -> Self {
        ScratchBuffer {
            buf: String::with_capacity(INITIAL_CAPACITY),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Result of the last cleaning call.
    pub fn as_str(&self) -> &str {
        &self.buf
    }

    /// Empties the buffer and makes room for `needed` bytes.
    fn prepare(&mut self, needed: usize) {
        self.buf.clear();
        if needed > self.buf.capacity() {
            trace!(from = self.buf.capacity(), to = needed, "Growing scratch buffer");
            self.buf.reserve(needed);
        }
    }

    /// Doubles every single quote and strips carriage returns.
    pub fn clean_sql(&mut self, text: &str) -> &str {
        self.prepare(text.len() * 2);
        for ch in text.chars() {
            match ch {
                '\'' => self.buf.push_str("''"),
                '\r' => {}
                _ => self.buf.push(ch),
            }
        }
        &self.buf
    }

    /// Doubles every single quote and leaves all other characters, including
    /// carriage returns, as they are.
    pub fn clean_html(&mut self, text: &str) -> &str {
        self.prepare(text.len() * 2);
        for ch in text.chars() {
            if ch == '\'' {
                self.buf.push_str("''");
            } else {
                self.buf.push(ch);
            }
        }
        &self.buf
    }

    /// Reverses backslash escaping: `\n` and `\t` become control characters,
    /// any other escaped character is kept without its backslash.
    pub fn unescape(&mut self, text: &str) -> &str {
        self.prepare(text.len());
        let mut chars = text.chars();
        while let Some(ch) = chars.next() {
            if ch != '\\' {
                self.buf.push(ch);
                continue;
            }
            match chars.next() {
                Some('n') => self.buf.push('\n'),
                Some('t') => self.buf.push('\t'),
                Some(other) => self.buf.push(other),
                None => {}
            }
        }
        &self.buf
    }
}
