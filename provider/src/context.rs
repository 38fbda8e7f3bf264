//! Serialized publish context.
//!
//! Consumers must be driven from one execution context, never concurrently.
//! Hosts with their own UI thread implement [`PublishContext`] on top of it;
//! [`SerialExecutor`] is a dedicated thread for everyone else.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread;

use tokio::sync::mpsc;

use crate::error::{PublishError, SinkError};

/// A unit of consumer work.
pub type PublishJob = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs one at a time, in the order they were posted.
pub trait PublishContext: Send + Sync {
    fn post(&self, job: PublishJob) -> Result<(), PublishError>;
}

/// A [`PublishContext`] backed by one named OS thread.
///
/// The thread exits once the executor is dropped and every posted job has run.
pub struct SerialExecutor {
    tx: Option<mpsc::UnboundedSender<PublishJob>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl SerialExecutor {
    pub fn spawn() -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<PublishJob>();
        let thread = thread::Builder::new()
            .name("errata-publish".to_string())
            .spawn(move || {
                while let Some(job) = rx.blocking_recv() {
                    if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
                        tracing::warn!(
                            error = %SinkError::from_panic(payload.as_ref()),
                            "Publish job panicked"
                        );
                    }
                }
                tracing::debug!("Publish context stopped");
            })?;
        Ok(Self {
            tx: Some(tx),
            thread: Some(thread),
        })
    }

    /// Stop accepting jobs and wait for the queued ones to finish.
    ///
    /// Must not be called from a job running on this executor.
    pub fn shutdown(mut self) {
        self.tx = None;
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!("Publish thread terminated abnormally");
        }
    }
}

impl PublishContext for SerialExecutor {
    fn post(&self, job: PublishJob) -> Result<(), PublishError> {
        let tx = self.tx.as_ref().ok_or(PublishError::ContextClosed)?;
        tx.send(job).map_err(|_| PublishError::ContextClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::mpsc as std_mpsc;

    use parking_lot::Mutex;

    #[test]
    fn test_jobs_run_in_order_on_one_thread() {
        let executor = SerialExecutor::spawn().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..20 {
            let seen = Arc::clone(&seen);
            executor
                .post(Box::new(move || {
                    seen.lock().push((i, thread::current().id()));
                }))
                .unwrap();
        }
        executor.shutdown();

        let seen = seen.lock();
        let order: Vec<i32> = seen.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, (0..20).collect::<Vec<_>>());
        assert!(seen.iter().all(|(_, id)| *id == seen[0].1));
        assert_ne!(seen[0].1, thread::current().id());
    }

    #[test]
    fn test_panicking_job_does_not_stop_executor() {
        let executor = SerialExecutor::spawn().unwrap();
        let (tx, rx) = std_mpsc::channel();

        executor.post(Box::new(|| panic!("bad consumer"))).unwrap();
        executor
            .post(Box::new(move || {
                let _ = tx.send("still running");
            }))
            .unwrap();

        assert_eq!(rx.recv().unwrap(), "still running");
        executor.shutdown();
    }
}
