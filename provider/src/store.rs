//! Aggregate store — current diagnostics per entry key.
//!
//! The store is plain data; the provider wraps it in one mutex and every
//! read or mutation happens under that lock. Nothing here blocks, performs
//! IO, or calls a consumer.

use std::collections::HashMap;

use indexmap::IndexMap;

use errata_types::{DiagnosticItem, EntryKey, Severity};

use crate::types::DiagnosticsSnapshot;

pub(crate) struct AggregateStore {
    data: IndexMap<EntryKey, Vec<DiagnosticItem>>,
}

impl AggregateStore {
    pub fn new() -> Self {
        Self {
            data: IndexMap::new(),
        }
    }

    /// Overwrite the list for `key`. An empty list drops the key.
    pub fn replace(&mut self, key: EntryKey, items: Vec<DiagnosticItem>) -> bool {
        if items.is_empty() {
            self.data.shift_remove(&key);
        } else {
            self.data.insert(key, items);
        }
        true
    }

    /// Extend the list for `key`, keeping producer order.
    pub fn append(&mut self, key: EntryKey, items: Vec<DiagnosticItem>) -> bool {
        if !items.is_empty() {
            self.data.entry(key).or_default().extend(items);
        }
        true
    }

    /// Remove `key`. The empty key clears everything.
    ///
    /// Returns `false` when there was nothing to remove.
    pub fn clear_one(&mut self, key: &EntryKey) -> bool {
        if key.is_empty() {
            return self.clear_all();
        }
        self.data.shift_remove(key).is_some()
    }

    pub fn clear_all(&mut self) -> bool {
        self.data.clear();
        true
    }

    pub fn items(&self, key: &EntryKey) -> Option<&[DiagnosticItem]> {
        self.data.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntryKey, &Vec<DiagnosticItem>)> {
        self.data.iter()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Copy the lists for the requested keys; absent keys are omitted.
    pub fn snapshot_for(&self, keys: &[EntryKey]) -> HashMap<EntryKey, Vec<DiagnosticItem>> {
        keys.iter()
            .filter_map(|key| {
                self.data
                    .get(key)
                    .map(|items| (key.clone(), items.clone()))
            })
            .collect()
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot::new(
            self.data
                .iter()
                .map(|(key, items)| (key.clone(), items.clone()))
                .collect(),
        )
    }

    /// High-severity items for specific keys, skipping keys that have none.
    pub fn high_severity_for(&self, keys: &[EntryKey]) -> Vec<(EntryKey, Vec<DiagnosticItem>)> {
        keys.iter()
            .filter_map(|key| {
                let high: Vec<DiagnosticItem> = self
                    .data
                    .get(key)?
                    .iter()
                    .filter(|item| item.severity() == Severity::High)
                    .cloned()
                    .collect();
                (!high.is_empty()).then(|| (key.clone(), high))
            })
            .collect()
    }
}
