//! Drives a provider from parsed script operations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use errata_provider::{DiagnosticProvider, SourceEntry, TextBuffer};

use crate::script::Op;

/// A scripted buffer: a name and a fixed length.
struct ScriptBuffer {
    name: String,
    len: usize,
}

impl TextBuffer for ScriptBuffer {
    fn name(&self) -> &str {
        &self.name
    }

    fn len_chars(&self) -> usize {
        self.len
    }
}

pub struct Replay<'a> {
    provider: &'a DiagnosticProvider,
    /// One entry per distinct path, so identity is stable for the whole run.
    entries: HashMap<String, SourceEntry>,
}

impl<'a> Replay<'a> {
    pub fn new(provider: &'a DiagnosticProvider) -> Self {
        Self {
            provider,
            entries: HashMap::new(),
        }
    }

    fn entry(&mut self, path: &str) -> SourceEntry {
        self.entries
            .entry(path.to_string())
            .or_insert_with(|| SourceEntry::new(path))
            .clone()
    }

    pub async fn apply(&mut self, op: Op) -> Result<()> {
        tracing::trace!(?op, "Replaying");
        match op {
            Op::Register { path, moniker, len } => {
                let entry = self.entry(&path);
                self.provider
                    .register_buffer(&entry, &moniker, Arc::new(ScriptBuffer { name: path, len }));
            }
            Op::Unregister { path, moniker } => {
                let entry = self.entry(&path);
                self.provider.unregister_buffer(&entry, &moniker);
            }
            Op::Replace {
                path,
                moniker,
                items,
            } => {
                let entry = self.entry(&path);
                self.provider.replace_items(&entry, &moniker, items);
            }
            Op::Add {
                path,
                moniker,
                items,
            } => {
                let entry = self.entry(&path);
                self.provider.add_items(&entry, &moniker, items);
            }
            Op::Clear { path, moniker } => {
                let entry = self.entry(&path);
                self.provider.clear(&entry, &moniker);
            }
            Op::ClearAll => self.provider.clear_all(),
            Op::Flush => {
                let elapsed = self.provider.flush().await?;
                tracing::info!(elapsed_ms = elapsed.as_millis(), "Flushed");
            }
            Op::Sleep { ms } => tokio::time::sleep(Duration::from_millis(ms)).await,
        }
        Ok(())
    }

    pub async fn run(&mut self, ops: Vec<Op>) -> Result<()> {
        for op in ops {
            self.apply(op).await?;
        }
        Ok(())
    }
}
