//! Append-only transcript of one call's input and output.

use std::sync::{Arc, Mutex};

use crate::error::Interrupt;
use crate::runtime::{OutputStream, lock};

/// In-memory character buffer with an optional size cap.
///
/// Offsets returned by [`InteractionLog::tell`] are byte offsets into the
/// buffer. The cap counts characters; `0` disables it.
#[derive(Debug, Default, Clone)]
pub struct InteractionLog {
    buf: String,
    chars: usize,
    position: usize,
    limit: usize,
}

impl InteractionLog {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Append `text`.
    ///
    /// The text is stored before the cap is checked, so the offending write
    /// stays in the transcript for diagnostics.
    pub fn write(&mut self, text: &str) -> Result<(), Interrupt> {
        self.buf.push_str(text);
        self.chars += text.chars().count();
        self.position = self.buf.len();
        if self.limit > 0 && self.chars > self.limit {
            return Err(Interrupt::LogOverflow { limit: self.limit });
        }
        Ok(())
    }

    /// Offset of the end of the buffer.
    pub fn tell(&self) -> usize {
        self.buf.len()
    }

    /// Move the read position; offsets past the end clamp to the end.
    pub fn seek(&mut self, offset: usize) -> usize {
        self.position = offset.min(self.buf.len());
        self.position
    }

    /// Lines from the read position to the end, each keeping its terminator.
    pub fn read_lines(&mut self) -> Vec<String> {
        let lines = split_lines(self.buf.get(self.position..).unwrap_or_default());
        self.position = self.buf.len();
        lines
    }

    /// Lines from `offset` to the end, each keeping its terminator.
    pub fn read_lines_from(&mut self, offset: usize) -> Vec<String> {
        self.seek(offset);
        self.read_lines()
    }

    /// Whole buffer.
    pub fn contents(&self) -> &str {
        &self.buf
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.chars
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(str::to_string).collect()
}

/// A log shared between the caller and the worker running the target.
pub type SharedLog = Arc<Mutex<InteractionLog>>;

/// Output stream that appends to a shared log.
pub struct LogStream(pub SharedLog);

impl OutputStream for LogStream {
    fn write(&self, text: &str) -> Result<(), Interrupt> {
        lock(&self.0).write(text)
    }
}
