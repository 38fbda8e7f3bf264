//! Source locations attached to diagnostics.
//!
//! Analyzers report positions as `(line, column, index)` triples. Line and
//! column are one-based; a zero in either means the analyzer only knew the
//! absolute character offset. The offset is zero-based.

use serde::{Deserialize, Serialize};

/// A single position in a source unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourcePosition {
    /// One-based line, or `0` when unknown.
    #[serde(default)]
    pub line: u32,
    /// One-based column, or `0` when unknown.
    #[serde(default)]
    pub column: u32,
    /// Zero-based absolute character offset.
    pub index: usize,
}

impl SourcePosition {
    #[must_use]
    pub const fn new(line: u32, column: u32, index: usize) -> Self {
        Self {
            line,
            column,
            index,
        }
    }

    /// A position for which only the absolute offset is known.
    #[must_use]
    pub const fn from_offset(index: usize) -> Self {
        Self {
            line: 0,
            column: 0,
            index,
        }
    }

    /// Whether a usable one-based line/column pair is present.
    #[must_use]
    pub const fn has_line_info(&self) -> bool {
        self.line > 0 && self.column > 0
    }
}

/// A start/end pair of positions as reported by the analyzer.
///
/// Nothing here is validated: analyzers run against text that may already
/// be stale, so `end` can precede `start` or point past the end of the
/// buffer. [`SourceSpan::clamp_to`] is the only way a span becomes a range
/// into live text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: SourcePosition,
    pub end: SourcePosition,
}

impl SourceSpan {
    #[must_use]
    pub const fn new(start: SourcePosition, end: SourcePosition) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn from_offsets(start: usize, end: usize) -> Self {
        Self {
            start: SourcePosition::from_offset(start),
            end: SourcePosition::from_offset(end),
        }
    }

    /// Resolve against a buffer whose current length is `buffer_len`.
    ///
    /// The buffer may have shrunk since the diagnostic was computed. The
    /// start is pinned inside the buffer and the length is clamped to
    /// `max(0, buffer_len - start)`, so the result is always a valid,
    /// possibly empty, range.
    #[must_use]
    pub fn clamp_to(&self, buffer_len: usize) -> TextRange {
        let start = self.start.index.min(buffer_len);
        let requested = self.end.index.saturating_sub(self.start.index);
        let available = buffer_len.saturating_sub(start);
        TextRange {
            start,
            end: start + requested.min(available),
        }
    }
}

/// A half-open `start..end` character range inside a live buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}
