//! Public types shared by the provider and its embedders.
//!
//! The embedder constructs a [`ProviderConfig`], and reads
//! [`DiagnosticsSnapshot`]s for status display and "check errors now" flows.

use std::time::Duration;

use serde::Deserialize;

use errata_types::{DiagnosticItem, EntryKey, Severity};

const DEFAULT_DEBOUNCE_MS: u64 = 1000;

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

/// Configuration for a diagnostic provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Minimum spacing between consumer refreshes while updates keep
    /// arriving, and how long the worker waits on an empty queue before it
    /// publishes and retires. Default: 1000.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl ProviderConfig {
    #[must_use]
    pub fn with_debounce(debounce: Duration) -> Self {
        Self {
            debounce_ms: u64::try_from(debounce.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// The debounce interval, never zero.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.max(1))
    }
}

/// Immutable copy of every current diagnostic.
///
/// Entries are in key insertion order; counts are always computed from the
/// entries rather than cached beside them.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsSnapshot {
    entries: Vec<(EntryKey, Vec<DiagnosticItem>)>,
}

impl DiagnosticsSnapshot {
    pub(crate) fn new(entries: Vec<(EntryKey, Vec<DiagnosticItem>)>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[(EntryKey, Vec<DiagnosticItem>)] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|(_, items)| items.is_empty())
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.entries
            .iter()
            .flat_map(|(_, items)| items)
            .filter(|item| item.severity() == severity)
            .count()
    }

    #[must_use]
    pub fn total_count(&self) -> usize {
        self.entries.iter().map(|(_, items)| items.len()).sum()
    }

    /// Compact status string like "H:3 N:5 L:0".
    #[must_use]
    pub fn status_string(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        format!(
            "H:{} N:{} L:{}",
            self.count(Severity::High),
            self.count(Severity::Normal),
            self.count(Severity::Low)
        )
    }
}

/// What one consumer refresh achieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Buffers whose tagger accepted a replace call.
    pub buffers_updated: usize,
    /// Buffers whose tagger lookup or replace call failed.
    pub buffers_failed: usize,
    /// Whether the problem list accepted the refresh signal.
    pub problem_list_ok: bool,
}
