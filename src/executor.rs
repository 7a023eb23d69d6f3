//! Completion executors for async results
//!
//! Layout state is owned by one thread. Fetch completions can arrive on any
//! runtime worker, so they are handed to a [`CompletionExecutor`] which runs
//! them inline when already on the owning thread and queues them otherwise.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use tokio::sync::{mpsc, Mutex};

/// A unit of work delivered to an executor
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Where async completions are applied
pub trait CompletionExecutor: Send + Sync {
    /// Whether the caller is already running on this executor
    fn is_current(&self) -> bool;

    /// Schedule `job` to run on this executor
    fn execute(&self, job: Job);
}

/// Run `job` on `executor`, skipping the hop when already there
pub fn complete_on<F>(executor: &dyn CompletionExecutor, job: F)
where
    F: FnOnce() + Send + 'static,
{
    if executor.is_current() {
        job();
    } else {
        executor.execute(Box::new(job));
    }
}

/// Executor that runs every job immediately on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl CompletionExecutor for InlineExecutor {
    fn is_current(&self) -> bool {
        true
    }

    fn execute(&self, job: Job) {
        job();
    }
}

/// Thread-bound queue drained by its owning thread
pub struct MainQueue {
    owner: ThreadId,
    sender: mpsc::UnboundedSender<Job>,
    receiver: Mutex<mpsc::UnboundedReceiver<Job>>,
}

impl MainQueue {
    /// Create a queue owned by the calling thread
    pub fn new() -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        Arc::new(Self {
            owner: thread::current().id(),
            sender,
            receiver: Mutex::new(receiver),
        })
    }

    /// Run every job queued so far; returns how many ran
    ///
    /// Does nothing when called off the owning thread.
    pub fn run_pending(&self) -> usize {
        if !self.is_current() {
            return 0;
        }
        let Ok(mut receiver) = self.receiver.try_lock() else {
            return 0;
        };
        let mut ran = 0;
        while let Ok(job) = receiver.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Wait for the next job and run it; `false` once every sender is gone
    pub async fn run_next(&self) -> bool {
        let job = self.receiver.lock().await.recv().await;
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }
}

impl CompletionExecutor for MainQueue {
    fn is_current(&self) -> bool {
        thread::current().id() == self.owner
    }

    fn execute(&self, job: Job) {
        if self.sender.send(job).is_err() {
            tracing::warn!("main queue closed, dropping completion");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_inline_when_current() {
        let queue = MainQueue::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        complete_on(queue.as_ref(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(queue.run_pending(), 0);
    }

    #[test]
    fn test_redispatch_from_other_thread() {
        let queue = MainQueue::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let remote = Arc::clone(&queue);
        let counter = Arc::clone(&hits);
        thread::spawn(move || {
            complete_on(remote.as_ref(), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        })
        .join()
        .unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(queue.run_pending(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_run_pending_off_owner_is_noop() {
        let queue = MainQueue::new();
        queue.execute(Box::new(|| {}));
        let remote = Arc::clone(&queue);
        let ran = thread::spawn(move || remote.run_pending()).join().unwrap();
        assert_eq!(ran, 0);
        assert_eq!(queue.run_pending(), 1);
    }
}
