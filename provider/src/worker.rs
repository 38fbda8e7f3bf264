//! Coalescing worker — the single-flight consumer of the update queue.
//!
//! ```text
//!          enqueue while Idle                 recv timed out
//!   Idle ───────────────────────▶ Draining ───────────────────▶ Exiting
//!    ▲                               ▲                             │
//!    │          queue empty          │    message raced in         │
//!    └───────────────────────────────┼─────────────────────────────┤
//!                                    └─────────────────────────────┤
//!                                           channel closed         ▼
//!                                                                Closed
//! ```
//!
//! Producers and the retiring worker both go through the queue lock, so a
//! message enqueued while the worker is exiting is either seen by its final
//! `try_recv` or starts a fresh worker. It is never dropped.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;

use crate::message::{Applied, FlushBarrier, Queued, UpdateMessage};
use crate::provider::ProviderShared;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerPhase {
    Idle,
    Draining,
    Exiting,
    Closed,
}

/// Queue state guarded by the enqueue lock.
pub(crate) struct QueueState {
    sender: Option<mpsc::UnboundedSender<Queued>>,
    /// The receiver, while no worker owns it.
    parked: Option<mpsc::UnboundedReceiver<Queued>>,
    phase: WorkerPhase,
    next_seq: u64,
    worker: Option<JoinHandle<()>>,
}

/// Outcome of [`QueueState::push`].
pub(crate) enum Pushed {
    /// Accepted; a worker is already draining.
    Queued(u64),
    /// Accepted; the caller must start a worker on this receiver.
    StartWorker(u64, mpsc::UnboundedReceiver<Queued>),
    /// The queue is closed. The message has been dropped.
    Rejected,
}

/// Outcome of [`QueueState::try_retire`].
pub(crate) enum Retire {
    /// A message arrived while exiting; keep draining.
    Resume {
        next: Queued,
        rx: mpsc::UnboundedReceiver<Queued>,
    },
    /// Receiver parked; the worker is done until the next enqueue.
    Parked,
    /// The queue was closed; the worker is done for good.
    Closed,
}

/// Outcome of [`QueueState::close`].
pub(crate) enum Close {
    AlreadyClosed,
    /// No worker was running; the channel is gone.
    Idle,
    /// A worker is still draining what was queued before the close.
    Draining(Option<JoinHandle<()>>),
}

impl QueueState {
    pub fn new() -> Self {
        let (sender, parked) = mpsc::unbounded_channel();
        Self {
            sender: Some(sender),
            parked: Some(parked),
            phase: WorkerPhase::Idle,
            next_seq: 0,
            worker: None,
        }
    }

    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_none()
    }

    pub fn set_phase(&mut self, phase: WorkerPhase) {
        self.phase = phase;
    }

    pub fn set_worker(&mut self, handle: JoinHandle<()>) {
        self.worker = Some(handle);
    }

    pub fn push(&mut self, message: UpdateMessage) -> Pushed {
        let Some(sender) = self.sender.as_ref() else {
            return Pushed::Rejected;
        };
        let seq = self.next_seq;
        if sender.send(Queued { seq, message }).is_err() {
            return Pushed::Rejected;
        }
        self.next_seq += 1;

        if self.phase != WorkerPhase::Idle {
            return Pushed::Queued(seq);
        }
        match self.parked.take() {
            Some(rx) => {
                self.phase = WorkerPhase::Draining;
                Pushed::StartWorker(seq, rx)
            }
            None => Pushed::Queued(seq),
        }
    }

    /// Called by an exiting worker once its final refresh is done.
    pub fn try_retire(&mut self, mut rx: mpsc::UnboundedReceiver<Queued>) -> Retire {
        match rx.try_recv() {
            Ok(next) => {
                self.phase = WorkerPhase::Draining;
                Retire::Resume { next, rx }
            }
            Err(TryRecvError::Empty) => {
                self.parked = Some(rx);
                self.phase = WorkerPhase::Idle;
                self.worker = None;
                Retire::Parked
            }
            Err(TryRecvError::Disconnected) => {
                self.phase = WorkerPhase::Closed;
                self.worker = None;
                Retire::Closed
            }
        }
    }

    /// Stop accepting messages.
    pub fn close(&mut self) -> Close {
        if self.sender.take().is_none() {
            return Close::AlreadyClosed;
        }
        if self.phase == WorkerPhase::Idle {
            self.parked = None;
            self.phase = WorkerPhase::Closed;
            return Close::Idle;
        }
        Close::Draining(self.worker.take())
    }
}

/// Enqueue a message, starting a worker if none is running.
///
/// Returns the message's sequence number, or `None` if the provider has
/// been disposed.
pub(crate) fn enqueue(shared: &Arc<ProviderShared>, message: UpdateMessage) -> Option<u64> {
    let kind = message.kind();
    let mut queue = shared.queue.lock();
    match queue.push(message) {
        Pushed::Queued(seq) => Some(seq),
        Pushed::StartWorker(seq, rx) => {
            let handle = shared.runtime.spawn(run(Arc::clone(shared), rx));
            queue.set_worker(handle);
            Some(seq)
        }
        Pushed::Rejected => {
            tracing::trace!(provider = %shared.id, kind, "Ignoring update after dispose");
            None
        }
    }
}

async fn run(shared: Arc<ProviderShared>, mut rx: mpsc::UnboundedReceiver<Queued>) {
    let interval = shared.debounce;
    let mut worker = Drain::new(Arc::clone(&shared));
    tracing::debug!(provider = %shared.id, "Diagnostics worker started");

    loop {
        let received = tokio::time::timeout(interval, rx.recv()).await;
        let next = match received {
            Ok(Some(next)) => next,
            Ok(None) => break,
            Err(_) => {
                shared.queue.lock().set_phase(WorkerPhase::Exiting);
                worker.settle().await;
                let retire = shared.queue.lock().try_retire(rx);
                match retire {
                    Retire::Resume { next, rx: kept } => {
                        rx = kept;
                        next
                    }
                    Retire::Parked => {
                        tracing::debug!(provider = %shared.id, "Diagnostics worker idle");
                        return;
                    }
                    Retire::Closed => {
                        tracing::debug!(provider = %shared.id, "Diagnostics worker closed");
                        return;
                    }
                }
            }
        };

        worker.apply(next);
        if worker.refresh_due(interval) {
            worker.refresh().await;
        }
    }

    worker.settle().await;
    shared.queue.lock().set_phase(WorkerPhase::Closed);
    tracing::debug!(provider = %shared.id, "Diagnostics worker closed");
}

/// Per-run worker state.
struct Drain {
    shared: Arc<ProviderShared>,
    pending: VecDeque<FlushBarrier>,
    dirty: bool,
    last_refresh: Instant,
    last_seq: Option<u64>,
}

impl Drain {
    fn new(shared: Arc<ProviderShared>) -> Self {
        Self {
            shared,
            pending: VecDeque::new(),
            dirty: false,
            last_refresh: Instant::now(),
            last_seq: None,
        }
    }

    fn apply(&mut self, queued: Queued) {
        let Queued { seq, message } = queued;
        debug_assert!(self.last_seq.is_none_or(|last| seq > last));
        self.last_seq = Some(seq);
        tracing::trace!(provider = %self.shared.id, seq, kind = message.kind(), "Applying update");

        let applied = {
            let mut store = self.shared.store.lock();
            message.apply(&mut store)
        };
        match applied {
            Applied::Store { changed } => self.dirty |= changed,
            Applied::Barrier(barrier) => self.pending.push_back(barrier),
        }
    }

    fn refresh_due(&self, interval: Duration) -> bool {
        self.dirty && self.last_refresh.elapsed() >= interval
    }

    async fn refresh(&mut self) {
        self.dirty = false;
        self.shared.refresh().await;
        self.last_refresh = Instant::now();
    }

    /// Final refresh if one is owed, then release every waiting barrier.
    async fn settle(&mut self) {
        if self.dirty {
            self.refresh().await;
        }
        while let Some(barrier) = self.pending.pop_front() {
            let elapsed = barrier.resolve();
            tracing::debug!(
                provider = %self.shared.id,
                elapsed_ms = elapsed.as_millis(),
                "Flush completed"
            );
        }
    }
}
