//! DiagnosticProvider facade — the API analysis workers call into.
//!
//! Producers enqueue updates without blocking; a single background worker
//! applies them and publishes to the problem list and squiggle layer.
//! Reads (`snapshot`, `items`) go straight to the store and do not wait
//! for the queue; use [`DiagnosticProvider::flush`] to observe a settled state.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::Handle;

use errata_types::{DiagnosticItem, EntryKey, ProviderId, SourceEntry};

use crate::context::PublishContext;
use crate::error::ProviderError;
use crate::message::{FlushBarrier, UpdateMessage};
use crate::publish::{BufferTable, RefreshPublisher};
use crate::sinks::{DecorationHost, ProblemList, TextBuffer};
use crate::store::AggregateStore;
use crate::tasks::TaskSource;
use crate::types::{DiagnosticsSnapshot, ProviderConfig, RefreshReport};
use crate::worker::{self, Close, QueueState, WorkerPhase};

/// The consumers a provider publishes to, and where it runs them.
pub struct Consumers {
    pub context: Arc<dyn PublishContext>,
    pub problem_list: Arc<dyn ProblemList>,
    pub decorations: Arc<dyn DecorationHost>,
}

/// State shared between the facade and its worker.
pub(crate) struct ProviderShared {
    pub id: ProviderId,
    pub debounce: Duration,
    pub runtime: Handle,
    pub queue: Mutex<QueueState>,
    pub store: Arc<Mutex<AggregateStore>>,
    pub buffers: Mutex<BufferTable>,
    pub publisher: RefreshPublisher,
}

impl ProviderShared {
    /// Publish the current state. Failures are logged, never propagated.
    pub async fn refresh(&self) -> RefreshReport {
        let started = Instant::now();
        match self.publisher.refresh(&self.store, &self.buffers).await {
            Ok(report) => {
                tracing::debug!(
                    provider = %self.id,
                    buffers_updated = report.buffers_updated,
                    buffers_failed = report.buffers_failed,
                    problem_list_ok = report.problem_list_ok,
                    elapsed_ms = started.elapsed().as_millis(),
                    "Diagnostics refreshed"
                );
                report
            }
            Err(e) => {
                tracing::warn!(provider = %self.id, error = %e, "Skipping diagnostics refresh");
                RefreshReport::default()
            }
        }
    }
}

/// Aggregates diagnostics from many producers and republishes them.
pub struct DiagnosticProvider {
    shared: Arc<ProviderShared>,
}

impl DiagnosticProvider {
    /// Create a provider whose worker runs on `runtime`.
    pub fn new(config: &ProviderConfig, runtime: Handle, consumers: Consumers) -> Self {
        let id = ProviderId::next();
        let store = Arc::new(Mutex::new(AggregateStore::new()));
        let tasks = TaskSource::new(id, Arc::clone(&store));
        let publisher = RefreshPublisher::new(
            consumers.context,
            consumers.problem_list,
            consumers.decorations,
            tasks,
        );

        tracing::debug!(provider = %id, debounce_ms = config.debounce_ms, "Diagnostic provider created");

        Self {
            shared: Arc::new(ProviderShared {
                id,
                debounce: config.debounce(),
                runtime,
                queue: Mutex::new(QueueState::new()),
                store,
                buffers: Mutex::new(BufferTable::new()),
                publisher,
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> ProviderId {
        self.shared.id
    }

    // ── Producer API ───────────────────────────────────────────────────

    /// Replace every diagnostic for `(entry, moniker)`.
    pub fn replace_items(&self, entry: &SourceEntry, moniker: &str, items: Vec<DiagnosticItem>) {
        self.enqueue(UpdateMessage::Replace {
            key: EntryKey::new(entry, moniker),
            items,
        });
    }

    /// Append diagnostics for `(entry, moniker)`.
    pub fn add_items(&self, entry: &SourceEntry, moniker: &str, items: Vec<DiagnosticItem>) {
        self.enqueue(UpdateMessage::Append {
            key: EntryKey::new(entry, moniker),
            items,
        });
    }

    pub fn clear(&self, entry: &SourceEntry, moniker: &str) {
        self.enqueue(UpdateMessage::ClearOne {
            key: EntryKey::new(entry, moniker),
        });
    }

    pub fn clear_all(&self) {
        self.enqueue(UpdateMessage::ClearAll);
    }

    /// Wait until everything enqueued before this call has been applied and
    /// a refresh attempted. Resolves with the time the barrier spent queued.
    ///
    /// The barrier is enqueued immediately, not when the future is first polled.
    pub fn flush(&self) -> impl Future<Output = Result<Duration, ProviderError>> + Send + 'static {
        let (barrier, done) = FlushBarrier::new();
        self.enqueue(UpdateMessage::Flush(barrier));
        async move { done.await.map_err(|_| ProviderError::Disposed) }
    }

    fn enqueue(&self, message: UpdateMessage) -> Option<u64> {
        worker::enqueue(&self.shared, message)
    }

    // ── Buffer registration ────────────────────────────────────────────

    /// Draw squiggles for `(entry, moniker)` on `buffer`, from the next refresh on.
    pub fn register_buffer(&self, entry: &SourceEntry, moniker: &str, buffer: Arc<dyn TextBuffer>) {
        self.shared
            .buffers
            .lock()
            .register(EntryKey::new(entry, moniker), buffer);
    }

    /// Stop drawing squiggles for `(entry, moniker)`. Safe to call from a sink.
    pub fn unregister_buffer(&self, entry: &SourceEntry, moniker: &str) {
        self.shared
            .buffers
            .lock()
            .unregister(&EntryKey::new(entry, moniker));
    }

    // ── Read side ──────────────────────────────────────────────────────

    #[must_use]
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        self.shared.store.lock().snapshot()
    }

    #[must_use]
    pub fn items(&self, entry: &SourceEntry, moniker: &str) -> Vec<DiagnosticItem> {
        self.shared
            .store
            .lock()
            .items(&EntryKey::new(entry, moniker))
            .map(<[DiagnosticItem]>::to_vec)
            .unwrap_or_default()
    }

    /// Only high-severity items for specific keys (for "check errors now" feedback).
    #[must_use]
    pub fn high_severity_for(&self, keys: &[EntryKey]) -> Vec<(EntryKey, Vec<DiagnosticItem>)> {
        self.shared.store.lock().high_severity_for(keys)
    }

    /// The handle the problem list enumerates through.
    #[must_use]
    pub fn task_source(&self) -> TaskSource {
        TaskSource::new(self.shared.id, Arc::clone(&self.shared.store))
    }

    /// Whether no worker is currently running.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.shared.queue.lock().phase() == WorkerPhase::Idle
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.queue.lock().is_closed()
    }

    // ── Shutdown ───────────────────────────────────────────────────────

    /// Shut the provider down.
    ///
    /// Updates already queued are applied and pending flushes resolved; later
    /// updates are ignored. Consumers end up showing no diagnostics and the
    /// problem list registration is released. Calling this again is a no-op.
    pub async fn dispose(&self) {
        let close = self.shared.queue.lock().close();
        match close {
            Close::AlreadyClosed => return,
            Close::Idle => {}
            Close::Draining(Some(worker)) => {
                if let Err(e) = worker.await {
                    tracing::warn!(provider = %self.shared.id, error = %e, "Diagnostics worker failed");
                }
            }
            Close::Draining(None) => {}
        }

        let cleared = {
            let mut store = self.shared.store.lock();
            let entries = store.len();
            store.clear_all();
            entries
        };
        self.shared.refresh().await;
        self.shared.buffers.lock().clear();
        self.shared.publisher.problem_list().unregister(self.shared.id);
        tracing::debug!(provider = %self.shared.id, cleared, "Diagnostic provider disposed");
    }
}
