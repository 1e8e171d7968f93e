//! History compression: replace the middle of a long conversation with
//! fixed-size placeholders.
//!
//! Once the history grows past [`CompressionPolicy::threshold`] entries,
//! every entry between the structural anchors (system prompt and first
//! instruction) and the most recent [`CompressionPolicy::keep_recent`]
//! entries is compressed. Compression discards the entry's detail for good,
//! so the pass is monotonic; re-running it over compressed entries is a
//! no-op.

use std::ops::Range;

/// Placeholder prefix for a compressed user instruction.
pub const USER_SUMMARY_PREFIX: &str = "[User Instruction Summary]: ";

/// Characters of the instruction kept after compression.
pub const USER_SUMMARY_CHARS: usize = 50;

/// Placeholder content of a compressed model response.
pub const ASSISTANT_SUMMARY: &str = "[Assistant Response Summary]";

/// `summary` field of a compressed tool result.
pub const TOOL_SUMMARY: &str = "Tool execution completed (details hidden)";

/// When and how much of the history to compress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionPolicy {
    /// Compression runs only when the history is longer than this.
    pub threshold: usize,
    /// Leading entries never compressed (system prompt, first instruction).
    pub anchors: usize,
    /// Trailing entries kept in full fidelity.
    pub keep_recent: usize,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self {
            threshold: 50,
            anchors: 2,
            keep_recent: 10,
        }
    }
}

impl CompressionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_keep_recent(mut self, keep_recent: usize) -> Self {
        self.keep_recent = keep_recent;
        self
    }

    /// Index range to compress for a history of `len` entries, if any.
    pub fn range(&self, len: usize) -> Option<Range<usize>> {
        if len <= self.threshold {
            return None;
        }
        let end = len.saturating_sub(self.keep_recent);
        (self.anchors < end).then_some(self.anchors..end)
    }
}

/// Keep the first `max_chars` characters of `text`.
pub(crate) fn char_prefix(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
