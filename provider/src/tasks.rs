//! Task-list adapter — the read side the problem list pulls through.
//!
//! This is a thin presentation layer over the store. It does not
//! participate in queueing or publishing.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use errata_types::{DiagnosticItem, EntryKey, ProviderId, Severity, TaskCategory, TaskPriority};

use crate::store::AggregateStore;

/// Where a task points in its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskLocation {
    /// One-based line and column.
    LineColumn { line: u32, column: u32 },
    /// Only the zero-based absolute offset was reported.
    Offset(usize),
    /// The diagnostic has no location.
    Unknown,
}

impl TaskLocation {
    fn from_item(item: &DiagnosticItem) -> Self {
        match item.span() {
            Some(span) if span.start.has_line_info() => Self::LineColumn {
                line: span.start.line,
                column: span.start.column,
            },
            Some(span) => Self::Offset(span.start.index),
            None => Self::Unknown,
        }
    }

    /// The one-based `(line, column)` pair, if known.
    #[must_use]
    pub fn line_column(self) -> Option<(u32, u32)> {
        match self {
            Self::LineColumn { line, column } => Some((line, column)),
            Self::Offset(_) | Self::Unknown => None,
        }
    }
}

/// One row of the problem list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntry {
    document: PathBuf,
    moniker: String,
    location: TaskLocation,
    text: String,
    severity: Severity,
}

impl TaskEntry {
    fn from_item(key: &EntryKey, item: &DiagnosticItem) -> Self {
        Self {
            document: key
                .entry()
                .map(|entry| entry.path().to_path_buf())
                .unwrap_or_default(),
            moniker: key.moniker().to_string(),
            location: TaskLocation::from_item(item),
            text: item.message().to_string(),
            severity: item.severity(),
        }
    }

    #[must_use]
    pub fn document(&self) -> &Path {
        &self.document
    }

    #[must_use]
    pub fn moniker(&self) -> &str {
        &self.moniker
    }

    #[must_use]
    pub fn location(&self) -> TaskLocation {
        self.location
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn category(&self) -> TaskCategory {
        self.severity.category()
    }

    #[must_use]
    pub fn priority(&self) -> TaskPriority {
        self.severity.priority()
    }
}

impl fmt::Display for TaskEntry {
    /// `path:line:col: severity: message`, or `path@offset: ...` when only
    /// an offset is known.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            TaskLocation::LineColumn { line, column } => {
                write!(f, "{}:{line}:{column}", self.document.display())?;
            }
            TaskLocation::Offset(index) => write!(f, "{}@{index}", self.document.display())?,
            TaskLocation::Unknown => write!(f, "{}", self.document.display())?,
        }
        write!(f, ": {}: {}", self.severity.label(), self.text)
    }
}

/// Handle through which a problem list enumerates a provider's diagnostics.
#[derive(Clone)]
pub struct TaskSource {
    id: ProviderId,
    store: Arc<Mutex<AggregateStore>>,
}

impl TaskSource {
    pub(crate) fn new(id: ProviderId, store: Arc<Mutex<AggregateStore>>) -> Self {
        Self { id, store }
    }

    #[must_use]
    pub fn id(&self) -> ProviderId {
        self.id
    }

    /// Every current diagnostic, in key insertion order then item order.
    #[must_use]
    pub fn tasks(&self) -> Vec<TaskEntry> {
        let store = self.store.lock();
        store
            .iter()
            .flat_map(|(key, items)| items.iter().map(move |item| TaskEntry::from_item(key, item)))
            .collect()
    }

    #[must_use]
    pub fn task_count(&self) -> usize {
        self.store.lock().iter().map(|(_, items)| items.len()).sum()
    }
}

impl fmt::Debug for TaskSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSource").field("id", &self.id).finish()
    }
}
