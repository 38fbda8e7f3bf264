//! Refresh publisher — pushes a coherent snapshot to both consumers.
//!
//! The worker side takes the registration table and the store snapshot
//! (each under its own lock, never nested), releases both, and posts a
//! single job to the publish context. The job runs every sink call without
//! holding any provider lock and hands back which buffers now show
//! squiggles; the worker folds that into the table once the job is done.
//! At most one refresh is in flight.

use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use errata_types::{DiagnosticItem, EntryKey, SquiggleTag};

use crate::context::PublishContext;
use crate::error::{PublishError, SinkError};
use crate::sinks::{DecorationHost, ProblemList, TextBuffer};
use crate::store::AggregateStore;
use crate::tasks::TaskSource;
use crate::types::RefreshReport;

/// Buffers registered for squiggles, by key.
pub(crate) struct BufferTable {
    buffers: IndexMap<EntryKey, Arc<dyn TextBuffer>>,
    /// Keys whose buffer showed diagnostics after the previous refresh.
    shown: HashSet<EntryKey>,
}

impl BufferTable {
    pub fn new() -> Self {
        Self {
            buffers: IndexMap::new(),
            shown: HashSet::new(),
        }
    }

    pub fn register(&mut self, key: EntryKey, buffer: Arc<dyn TextBuffer>) {
        self.buffers.insert(key, buffer);
    }

    pub fn unregister(&mut self, key: &EntryKey) -> bool {
        self.shown.remove(key);
        self.buffers.shift_remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.buffers.clear();
        self.shown.clear();
    }

    /// Every registration, with whether it showed squiggles last time.
    pub fn entries(&self) -> Vec<(EntryKey, Arc<dyn TextBuffer>, bool)> {
        self.buffers
            .iter()
            .map(|(key, buffer)| (key.clone(), Arc::clone(buffer), self.shown.contains(key)))
            .collect()
    }

    /// Record what each buffer shows after a refresh. Keys unregistered
    /// while the refresh ran are skipped.
    fn settle(&mut self, shown: Vec<(EntryKey, bool)>) {
        for (key, now_shown) in shown {
            if !self.buffers.contains_key(&key) {
                continue;
            }
            if now_shown {
                self.shown.insert(key);
            } else {
                self.shown.remove(&key);
            }
        }
    }
}

/// What one registered buffer should show after this refresh.
struct BufferUpdate {
    key: EntryKey,
    buffer: Arc<dyn TextBuffer>,
    has_diagnostics: bool,
    shown_before: bool,
    tags: Vec<SquiggleTag>,
}

pub(crate) struct RefreshPublisher {
    context: Arc<dyn PublishContext>,
    problem_list: Arc<dyn ProblemList>,
    decorations: Arc<dyn DecorationHost>,
    tasks: TaskSource,
}

impl RefreshPublisher {
    pub fn new(
        context: Arc<dyn PublishContext>,
        problem_list: Arc<dyn ProblemList>,
        decorations: Arc<dyn DecorationHost>,
        tasks: TaskSource,
    ) -> Self {
        Self {
            context,
            problem_list,
            decorations,
            tasks,
        }
    }

    pub fn problem_list(&self) -> &Arc<dyn ProblemList> {
        &self.problem_list
    }

    pub async fn refresh(
        &self,
        store: &Mutex<AggregateStore>,
        buffers: &Mutex<BufferTable>,
    ) -> Result<RefreshReport, PublishError> {
        let registered = buffers.lock().entries();
        let keys: Vec<EntryKey> = registered.iter().map(|(key, _, _)| key.clone()).collect();
        let mut current = store.lock().snapshot_for(&keys);

        let batch = registered
            .into_iter()
            .map(|(key, buffer, shown_before)| {
                let items = current.remove(&key).unwrap_or_default();
                BufferUpdate {
                    has_diagnostics: !items.is_empty(),
                    shown_before,
                    tags: items.iter().filter_map(DiagnosticItem::squiggle).collect(),
                    key,
                    buffer,
                }
            })
            .collect();

        let job = RefreshJob {
            batch,
            decorations: Arc::clone(&self.decorations),
            problem_list: Arc::clone(&self.problem_list),
            tasks: self.tasks.clone(),
        };

        let (done_tx, done_rx) = oneshot::channel();
        self.context.post(Box::new(move || {
            let _ = done_tx.send(job.run());
        }))?;
        let outcome = done_rx.await.map_err(|_| PublishError::ContextClosed)?;
        buffers.lock().settle(outcome.shown);
        Ok(outcome.report)
    }
}

struct RefreshOutcome {
    report: RefreshReport,
    /// Per published key: whether its buffer shows squiggles now.
    shown: Vec<(EntryKey, bool)>,
}

/// Runs on the publish context.
struct RefreshJob {
    batch: Vec<BufferUpdate>,
    decorations: Arc<dyn DecorationHost>,
    problem_list: Arc<dyn ProblemList>,
    tasks: TaskSource,
}

impl RefreshJob {
    fn run(self) -> RefreshOutcome {
        let mut report = RefreshReport::default();
        let mut shown = Vec::new();

        for update in self.batch {
            if !update.has_diagnostics && !update.shown_before {
                continue;
            }

            let now_shown = match publish_squiggles(self.decorations.as_ref(), &update) {
                Ok(updated) => {
                    if updated {
                        report.buffers_updated += 1;
                    }
                    update.has_diagnostics
                }
                Err(e) => {
                    tracing::warn!(
                        key = %update.key,
                        buffer = update.buffer.name(),
                        error = %e,
                        "Failed to refresh squiggles"
                    );
                    report.buffers_failed += 1;
                    // Keep it marked so the next refresh retries the clear.
                    true
                }
            };
            shown.push((update.key, now_shown));
        }

        let list = &self.problem_list;
        let tasks = &self.tasks;
        let outcome = catch_unwind(AssertUnwindSafe(|| list.refresh_all(tasks)))
            .unwrap_or_else(|payload| Err(SinkError::from_panic(payload.as_ref())));
        match outcome {
            Ok(()) => report.problem_list_ok = true,
            Err(e) => tracing::warn!(provider = %tasks.id(), error = %e, "Problem list refresh failed"),
        }

        RefreshOutcome { report, shown }
    }
}

/// Returns `Ok(false)` when the buffer has no tagger.
fn publish_squiggles(decorations: &dyn DecorationHost, update: &BufferUpdate) -> Result<bool, SinkError> {
    let buffer = update.buffer.as_ref();
    catch_unwind(AssertUnwindSafe(|| {
        let Some(tagger) = decorations.tagger_for(buffer) else {
            return Ok(false);
        };
        let len = buffer.len_chars();
        let squiggles = update.tags.iter().map(|tag| tag.resolve(len)).collect();
        tagger.replace_all(squiggles).map(|()| true)
    }))
    .unwrap_or_else(|payload| Err(SinkError::from_panic(payload.as_ref())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use errata_types::{ProviderId, ResolvedSquiggle, Severity, SourceEntry, SourceSpan, TextRange};

    use crate::context::PublishJob;
    use crate::sinks::Tagger;

    /// Runs jobs inline on the caller's thread.
    struct InlineContext;

    impl PublishContext for InlineContext {
        fn post(&self, job: PublishJob) -> Result<(), PublishError> {
            job();
            Ok(())
        }
    }

    struct ClosedContext;

    impl PublishContext for ClosedContext {
        fn post(&self, _job: PublishJob) -> Result<(), PublishError> {
            Err(PublishError::ContextClosed)
        }
    }

    struct FixedBuffer {
        name: String,
        len: usize,
    }

    impl TextBuffer for FixedBuffer {
        fn name(&self) -> &str {
            &self.name
        }

        fn len_chars(&self) -> usize {
            self.len
        }
    }

    #[derive(Default)]
    struct RecordingTagger {
        calls: Mutex<Vec<Vec<ResolvedSquiggle>>>,
        fail: bool,
    }

    impl Tagger for RecordingTagger {
        fn replace_all(&self, squiggles: Vec<ResolvedSquiggle>) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::new("buffer closed"));
            }
            self.calls.lock().push(squiggles);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Host {
        taggers: HashMap<String, Arc<RecordingTagger>>,
    }

    impl DecorationHost for Host {
        fn tagger_for(&self, buffer: &dyn TextBuffer) -> Option<Arc<dyn Tagger>> {
            self.taggers
                .get(buffer.name())
                .map(|tagger| Arc::clone(tagger) as Arc<dyn Tagger>)
        }
    }

    #[derive(Default)]
    struct CountingList {
        refreshes: Mutex<usize>,
    }

    impl ProblemList for CountingList {
        fn refresh_all(&self, _source: &TaskSource) -> Result<(), SinkError> {
            *self.refreshes.lock() += 1;
            Ok(())
        }
    }

    struct PanickingList;

    impl ProblemList for PanickingList {
        fn refresh_all(&self, _source: &TaskSource) -> Result<(), SinkError> {
            panic!("list window destroyed");
        }
    }

    struct Fixture {
        store: Arc<Mutex<AggregateStore>>,
        buffers: Mutex<BufferTable>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: Arc::new(Mutex::new(AggregateStore::new())),
                buffers: Mutex::new(BufferTable::new()),
            }
        }

        fn register(&self, key: &EntryKey, name: &str, len: usize) {
            self.buffers.lock().register(
                key.clone(),
                Arc::new(FixedBuffer {
                    name: name.to_string(),
                    len,
                }),
            );
        }

        fn publisher(
            &self,
            context: Arc<dyn PublishContext>,
            list: Arc<dyn ProblemList>,
            host: Arc<dyn DecorationHost>,
        ) -> RefreshPublisher {
            let tasks = TaskSource::new(ProviderId::new(1), Arc::clone(&self.store));
            RefreshPublisher::new(context, list, host, tasks)
        }
    }

    fn squiggly(msg: &str, start: usize, end: usize) -> DiagnosticItem {
        DiagnosticItem::new(msg, Some(SourceSpan::from_offsets(start, end)), Severity::High)
            .with_squiggle(true)
    }

    #[tokio::test]
    async fn test_refresh_replaces_squiggles_and_clamps() {
        let fixture = Fixture::new();
        let key = EntryKey::new(&SourceEntry::new("a.flx"), "parser");
        fixture.register(&key, "a", 10);
        fixture
            .store
            .lock()
            .replace(key.clone(), vec![squiggly("x", 2, 4), squiggly("y", 8, 30)]);

        let tagger = Arc::new(RecordingTagger::default());
        let mut host = Host::default();
        host.taggers.insert("a".to_string(), Arc::clone(&tagger));
        let list = Arc::new(CountingList::default());
        let publisher = fixture.publisher(Arc::new(InlineContext), list.clone(), Arc::new(host));

        let report = publisher.refresh(&fixture.store, &fixture.buffers).await.unwrap();
        assert_eq!(report.buffers_updated, 1);
        assert!(report.problem_list_ok);
        assert_eq!(*list.refreshes.lock(), 1);

        let calls = tagger.calls.lock();
        let ranges: Vec<TextRange> = calls[0].iter().map(|s| s.range).collect();
        assert_eq!(
            ranges,
            [TextRange { start: 2, end: 4 }, TextRange { start: 8, end: 10 }]
        );
    }

    #[tokio::test]
    async fn test_cleared_key_gets_empty_replace_once() {
        let fixture = Fixture::new();
        let key = EntryKey::new(&SourceEntry::new("a.flx"), "parser");
        fixture.register(&key, "a", 100);
        fixture
            .store
            .lock()
            .replace(key.clone(), vec![squiggly("x", 0, 1), squiggly("y", 2, 3)]);

        let tagger = Arc::new(RecordingTagger::default());
        let mut host = Host::default();
        host.taggers.insert("a".to_string(), Arc::clone(&tagger));
        let publisher = fixture.publisher(
            Arc::new(InlineContext),
            Arc::new(CountingList::default()),
            Arc::new(host),
        );

        publisher.refresh(&fixture.store, &fixture.buffers).await.unwrap();
        fixture.store.lock().clear_one(&key);
        publisher.refresh(&fixture.store, &fixture.buffers).await.unwrap();
        publisher.refresh(&fixture.store, &fixture.buffers).await.unwrap();

        let calls = tagger.calls.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].len(), 2);
        assert!(calls[1].is_empty());
    }

    #[tokio::test]
    async fn test_buffer_without_tagger_is_skipped() {
        let fixture = Fixture::new();
        let key = EntryKey::new(&SourceEntry::new("a.flx"), "parser");
        fixture.register(&key, "no-tagger", 100);
        fixture.store.lock().replace(key, vec![squiggly("x", 0, 1)]);

        let publisher = fixture.publisher(
            Arc::new(InlineContext),
            Arc::new(CountingList::default()),
            Arc::new(Host::default()),
        );
        let report = publisher.refresh(&fixture.store, &fixture.buffers).await.unwrap();
        assert_eq!(report.buffers_updated, 0);
        assert_eq!(report.buffers_failed, 0);
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_block_others() {
        let fixture = Fixture::new();
        let entry = SourceEntry::new("a.flx");
        let bad_key = EntryKey::new(&entry, "parser");
        let good_key = EntryKey::new(&entry, "imports");
        fixture.register(&bad_key, "bad", 100);
        fixture.register(&good_key, "good", 100);
        fixture.store.lock().replace(bad_key, vec![squiggly("x", 0, 1)]);
        fixture.store.lock().replace(good_key, vec![squiggly("y", 0, 1)]);

        let good = Arc::new(RecordingTagger::default());
        let mut host = Host::default();
        host.taggers.insert(
            "bad".to_string(),
            Arc::new(RecordingTagger {
                fail: true,
                ..RecordingTagger::default()
            }),
        );
        host.taggers.insert("good".to_string(), Arc::clone(&good));
        let publisher = fixture.publisher(Arc::new(InlineContext), Arc::new(PanickingList), Arc::new(host));

        let report = publisher.refresh(&fixture.store, &fixture.buffers).await.unwrap();
        assert_eq!(report.buffers_failed, 1);
        assert_eq!(report.buffers_updated, 1);
        assert!(!report.problem_list_ok);
        assert_eq!(good.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_closed_context_is_reported() {
        let fixture = Fixture::new();
        let publisher = fixture.publisher(
            Arc::new(ClosedContext),
            Arc::new(CountingList::default()),
            Arc::new(Host::default()),
        );
        let err = publisher
            .refresh(&fixture.store, &fixture.buffers)
            .await
            .unwrap_err();
        assert_eq!(err, PublishError::ContextClosed);
    }

    #[test]
    fn test_buffer_table_register_replaces() {
        let mut table = BufferTable::new();
        let key = EntryKey::new(&SourceEntry::new("a.flx"), "parser");
        table.register(
            key.clone(),
            Arc::new(FixedBuffer {
                name: "first".to_string(),
                len: 1,
            }),
        );
        table.register(
            key.clone(),
            Arc::new(FixedBuffer {
                name: "second".to_string(),
                len: 1,
            }),
        );
        let entries = table.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1.name(), "second");
        assert!(!entries[0].2);
        assert!(table.unregister(&key));
        assert!(!table.unregister(&key));
    }

    #[test]
    fn test_settle_skips_keys_unregistered_meanwhile() {
        let mut table = BufferTable::new();
        let entry = SourceEntry::new("a.flx");
        let kept = EntryKey::new(&entry, "parser");
        let dropped = EntryKey::new(&entry, "imports");
        for key in [&kept, &dropped] {
            table.register(
                key.clone(),
                Arc::new(FixedBuffer {
                    name: key.to_string(),
                    len: 1,
                }),
            );
        }

        table.unregister(&dropped);
        table.settle(vec![(kept.clone(), true), (dropped.clone(), true)]);
        assert!(table.shown.contains(&kept));
        assert!(!table.shown.contains(&dropped));

        // Re-registering starts clean: no stale clear is owed.
        table.register(
            dropped.clone(),
            Arc::new(FixedBuffer {
                name: "again".to_string(),
                len: 1,
            }),
        );
        assert!(table.entries().iter().all(|(key, _, shown)| *shown == (key == &kept)));
    }

    #[tokio::test]
    async fn test_no_lock_is_held_while_sinks_run() {
        struct LockCheckingList {
            store: Arc<Mutex<AggregateStore>>,
            buffers: Arc<Mutex<BufferTable>>,
            free: Mutex<Option<bool>>,
        }

        impl ProblemList for LockCheckingList {
            fn refresh_all(&self, _source: &TaskSource) -> Result<(), SinkError> {
                let free = !self.store.is_locked() && !self.buffers.is_locked();
                *self.free.lock() = Some(free);
                Ok(())
            }
        }

        let store = Arc::new(Mutex::new(AggregateStore::new()));
        let buffers = Arc::new(Mutex::new(BufferTable::new()));
        let list = Arc::new(LockCheckingList {
            store: Arc::clone(&store),
            buffers: Arc::clone(&buffers),
            free: Mutex::new(None),
        });
        let tasks = TaskSource::new(ProviderId::new(1), Arc::clone(&store));
        let publisher = RefreshPublisher::new(
            Arc::new(InlineContext),
            list.clone(),
            Arc::new(Host::default()),
            tasks,
        );

        publisher.refresh(&store, &buffers).await.unwrap();
        assert_eq!(*list.free.lock(), Some(true));
    }
}
