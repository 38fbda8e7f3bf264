//! Diagnostic value types for Errata.
//!
//! This crate contains pure value types with no IO and no async: the
//! diagnostic item an analyzer reports, the source span it points at, and
//! the key that says which source unit and stream it belongs to.

mod entry;
mod ids;
mod item;
mod severity;
mod span;

pub use entry::{EntryKey, SourceEntry};
pub use ids::ProviderId;
pub use item::{DiagnosticItem, ResolvedSquiggle, SquiggleTag};
pub use severity::{Severity, SquiggleKind, TaskCategory, TaskPriority};
pub use span::{SourcePosition, SourceSpan, TextRange};
