//! Coalescing diagnostic provider.
//!
//! Many analysis producers report diagnostics keyed by `(source entry,
//! moniker)`; a single background worker folds them into one aggregate store
//! and republishes to the problem list and per-buffer squiggles at most once
//! per debounce interval.

pub mod context;
pub mod error;
pub mod sinks;
pub mod tasks;
pub mod types;

pub(crate) mod message;
pub(crate) mod publish;
pub(crate) mod store;
pub(crate) mod worker;

mod provider;

pub use context::{PublishContext, PublishJob, SerialExecutor};
pub use error::{ProviderError, PublishError, SinkError};
pub use provider::{Consumers, DiagnosticProvider};
pub use sinks::{DecorationHost, NoDecorations, ProblemList, Tagger, TextBuffer};
pub use tasks::{TaskEntry, TaskLocation, TaskSource};
pub use types::{DiagnosticsSnapshot, ProviderConfig, RefreshReport};

pub use errata_types::{
    DiagnosticItem, EntryKey, ProviderId, ResolvedSquiggle, Severity, SourceEntry, SourcePosition,
    SourceSpan, SquiggleKind, SquiggleTag, TaskCategory, TaskPriority, TextRange,
};
