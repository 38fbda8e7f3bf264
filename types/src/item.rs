//! A single diagnostic and the squiggle descriptor derived from it.

use serde::{Deserialize, Serialize};

use crate::severity::{Severity, SquiggleKind};
use crate::span::{SourceSpan, TextRange};

/// One diagnostic reported by an analyzer.
///
/// Fields are private; an item is never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticItem {
    message: String,
    /// `None` when the analyzer had no usable location.
    #[serde(default)]
    span: Option<SourceSpan>,
    severity: Severity,
    #[serde(default, rename = "squiggle")]
    wants_squiggle: bool,
}

impl DiagnosticItem {
    #[must_use]
    pub fn new(message: impl Into<String>, span: Option<SourceSpan>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            span,
            severity,
            wants_squiggle: false,
        }
    }

    #[must_use]
    pub fn with_squiggle(mut self, wants_squiggle: bool) -> Self {
        self.wants_squiggle = wants_squiggle;
        self
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn span(&self) -> Option<&SourceSpan> {
        self.span.as_ref()
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn wants_squiggle(&self) -> bool {
        self.wants_squiggle
    }

    /// The squiggle to render for this item, if it asked for one and has a span.
    #[must_use]
    pub fn squiggle(&self) -> Option<SquiggleTag> {
        if !self.wants_squiggle {
            return None;
        }
        let span = self.span?;
        Some(SquiggleTag {
            span,
            kind: self.severity.squiggle_kind(),
            tooltip: self.message.clone(),
        })
    }
}

/// Decoration descriptor in analyzer coordinates, not yet tied to a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SquiggleTag {
    pub span: SourceSpan,
    pub kind: SquiggleKind,
    pub tooltip: String,
}

impl SquiggleTag {
    /// Pin this tag to a buffer of the given current length.
    #[must_use]
    pub fn resolve(&self, buffer_len: usize) -> ResolvedSquiggle {
        ResolvedSquiggle {
            range: self.span.clamp_to(buffer_len),
            kind: self.kind,
            tooltip: self.tooltip.clone(),
        }
    }
}

/// A squiggle ready to hand to a tagger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSquiggle {
    pub range: TextRange,
    pub kind: SquiggleKind,
    pub tooltip: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_squiggle_unless_requested() {
        let item = DiagnosticItem::new(
            "unused import",
            Some(SourceSpan::from_offsets(0, 4)),
            Severity::Normal,
        );
        assert!(item.squiggle().is_none());
    }

    #[test]
    fn test_no_squiggle_without_span() {
        let item = DiagnosticItem::new("cycle in imports", None, Severity::High).with_squiggle(true);
        assert!(item.squiggle().is_none());
    }

    #[test]
    fn test_squiggle_carries_kind_and_tooltip() {
        let item = DiagnosticItem::new(
            "expected `)`",
            Some(SourceSpan::from_offsets(12, 13)),
            Severity::High,
        )
        .with_squiggle(true);
        let tag = item.squiggle().unwrap();
        assert_eq!(tag.kind, SquiggleKind::Error);
        assert_eq!(tag.tooltip, "expected `)`");

        let resolved = tag.resolve(12);
        assert_eq!(resolved.range, TextRange { start: 12, end: 12 });
    }

    #[test]
    fn test_deserialize_defaults() {
        let item: DiagnosticItem =
            serde_json::from_str(r#"{"message": "m", "severity": "low"}"#).unwrap();
        assert_eq!(item.span(), None);
        assert!(!item.wants_squiggle());
    }
}
