//! Update messages — the commands producers enqueue for the worker.

use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use errata_types::{DiagnosticItem, EntryKey};

use crate::store::AggregateStore;

/// A queued marker whose completion means every earlier message has been
/// applied and published.
///
/// Dropping a barrier without resolving it closes its channel, which the
/// waiting caller observes as the provider having been disposed.
pub(crate) struct FlushBarrier {
    created: Instant,
    done: oneshot::Sender<Duration>,
}

impl FlushBarrier {
    pub fn new() -> (Self, oneshot::Receiver<Duration>) {
        let (done, rx) = oneshot::channel();
        (
            Self {
                created: Instant::now(),
                done,
            },
            rx,
        )
    }

    /// Signal the waiter with the time elapsed since the barrier was created.
    pub fn resolve(self) -> Duration {
        let elapsed = self.created.elapsed();
        // The caller may have stopped waiting; that is fine.
        let _ = self.done.send(elapsed);
        elapsed
    }
}

pub(crate) enum UpdateMessage {
    Replace {
        key: EntryKey,
        items: Vec<DiagnosticItem>,
    },
    Append {
        key: EntryKey,
        items: Vec<DiagnosticItem>,
    },
    ClearOne {
        key: EntryKey,
    },
    ClearAll,
    Flush(FlushBarrier),
}

/// Result of applying one message.
pub(crate) enum Applied {
    /// The store was mutated; `changed` says whether a refresh is owed.
    Store { changed: bool },
    /// A barrier, handed back so the worker can hold it until the queue drains.
    Barrier(FlushBarrier),
}

/// A message stamped with its enqueue sequence number.
pub(crate) struct Queued {
    pub seq: u64,
    pub message: UpdateMessage,
}

impl UpdateMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Replace { .. } => "replace",
            Self::Append { .. } => "append",
            Self::ClearOne { .. } => "clear",
            Self::ClearAll => "clear_all",
            Self::Flush(_) => "flush",
        }
    }

    pub fn apply(self, store: &mut AggregateStore) -> Applied {
        let changed = match self {
            Self::Replace { key, items } => store.replace(key, items),
            Self::Append { key, items } => store.append(key, items),
            Self::ClearOne { key } => store.clear_one(&key),
            Self::ClearAll => store.clear_all(),
            Self::Flush(barrier) => return Applied::Barrier(barrier),
        };
        Applied::Store { changed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use errata_types::{Severity, SourceEntry};

    fn changed(applied: Applied) -> bool {
        match applied {
            Applied::Store { changed } => changed,
            Applied::Barrier(_) => panic!("expected a store mutation"),
        }
    }

    #[test]
    fn test_apply_reports_change() {
        let mut store = AggregateStore::new();
        let key = EntryKey::new(&SourceEntry::new("a.flx"), "parser");

        let replace = UpdateMessage::Replace {
            key: key.clone(),
            items: vec![DiagnosticItem::new("x", None, Severity::High)],
        };
        assert!(changed(replace.apply(&mut store)));
        assert!(changed(
            UpdateMessage::ClearOne { key: key.clone() }.apply(&mut store)
        ));
        assert!(!changed(UpdateMessage::ClearOne { key }.apply(&mut store)));
        assert!(changed(UpdateMessage::ClearAll.apply(&mut store)));
    }

    #[test]
    fn test_flush_does_not_touch_store() {
        let mut store = AggregateStore::new();
        let key = EntryKey::new(&SourceEntry::new("a.flx"), "parser");
        store.replace(key.clone(), vec![DiagnosticItem::new("x", None, Severity::Low)]);

        let (barrier, _rx) = FlushBarrier::new();
        let applied = UpdateMessage::Flush(barrier).apply(&mut store);
        assert!(matches!(applied, Applied::Barrier(_)));
        assert_eq!(store.items(&key).map(<[DiagnosticItem]>::len), Some(1));
    }

    #[tokio::test]
    async fn test_barrier_resolves_with_elapsed() {
        let (barrier, rx) = FlushBarrier::new();
        let reported = barrier.resolve();
        assert_eq!(rx.await.unwrap(), reported);
    }

    #[tokio::test]
    async fn test_dropped_barrier_closes_channel() {
        let (barrier, rx) = FlushBarrier::new();
        drop(barrier);
        assert!(rx.await.is_err());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(UpdateMessage::ClearAll.kind(), "clear_all");
        let (barrier, _rx) = FlushBarrier::new();
        assert_eq!(UpdateMessage::Flush(barrier).kind(), "flush");
    }
}
