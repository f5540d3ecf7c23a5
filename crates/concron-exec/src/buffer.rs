use std::{borrow::Cow, fmt};

/// Default capacity of an execution's output buffer.
pub const DEFAULT_OUTPUT_LIMIT: usize = 64 * 1024;

/// Bounded byte buffer receiving a child's interleaved stdout and stderr.
///
/// Keeps the most recent `limit` bytes; older bytes are discarded and counted.
#[derive(Debug)]
pub struct OutputBuffer {
    data: Vec<u8>,
    limit: usize,
    dropped: usize,
}

impl OutputBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            limit,
            dropped: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);
        if self.data.len() > self.limit {
            let excess = self.data.len() - self.limit;
            self.data.drain(..excess);
            self.dropped += excess;
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Move the contents out, leaving the buffer empty.
    pub fn take(&mut self) -> CapturedOutput {
        let out = CapturedOutput {
            bytes: std::mem::take(&mut self.data),
            dropped: self.dropped,
        };
        self.dropped = 0;
        out
    }
}

/// Output of a finished execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    bytes: Vec<u8>,
    dropped: usize,
}

impl CapturedOutput {
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of leading bytes discarded because the buffer was full.
    #[inline]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty() && self.dropped == 0
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

impl fmt::Display for CapturedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dropped > 0 {
            write!(f, "[{} bytes truncated] ", self.dropped)?;
        }
        f.write_str(&self.text())
    }
}
