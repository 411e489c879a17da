//! Scheduling strategies
//!
//! TigerStyle: One extension point for execution, no hidden threads.
//!
//! A mailbox never runs its actor by itself. Whenever a drain step is due it
//! hands a [`Task`] to the runtime, which forwards it to the configured
//! [`Scheduler`]. Two strategies ship with the crate:
//!
//! - [`ExecutorScheduler`]: runs drain steps on the tokio blocking pool, so
//!   different actors make progress in parallel and synchronous actor code
//!   never stalls async workers.
//! - [`DirectScheduler`]: runs drain steps inline on the calling thread. Used
//!   for deterministic tests and single-threaded embedding.

use shoal_core::error::{Error, Result};
use tokio::runtime::Handle;

/// One drain step of a mailbox
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Strategy deciding where a mailbox drain step executes
pub trait Scheduler: Send + Sync + 'static {
    /// Execute `task` now or at some later point, exactly once
    fn schedule(&self, task: Task);

    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Whether `schedule` runs the task before returning
    ///
    /// Mailboxes drain in a loop instead of rescheduling each step on such
    /// schedulers, which keeps the stack flat.
    fn runs_inline(&self) -> bool {
        false
    }
}

/// Runs drain steps on the blocking pool of a tokio runtime
#[derive(Debug, Clone)]
pub struct ExecutorScheduler {
    handle: Handle,
}

impl ExecutorScheduler {
    /// Create a scheduler bound to the given tokio runtime
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Create a scheduler bound to the tokio runtime of the caller
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| Error::internal(format!("no tokio runtime in context: {}", e)))?;
        Ok(Self::new(handle))
    }
}

impl Scheduler for ExecutorScheduler {
    fn schedule(&self, task: Task) {
        // Detached: completion is observed through the mailbox, not the JoinHandle
        drop(self.handle.spawn_blocking(task));
    }

    fn name(&self) -> &'static str {
        "executor"
    }
}

/// Runs drain steps synchronously in the caller's thread
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectScheduler;

impl Scheduler for DirectScheduler {
    fn schedule(&self, task: Task) {
        task();
    }

    fn name(&self) -> &'static str {
        "direct"
    }

    fn runs_inline(&self) -> bool {
        true
    }
}

/// Holds drain steps until a test runs them explicitly
#[cfg(test)]
#[derive(Default)]
pub(crate) struct ManualScheduler {
    tasks: std::sync::Mutex<std::collections::VecDeque<Task>>,
}

#[cfg(test)]
impl ManualScheduler {
    pub(crate) fn queued(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    pub(crate) fn run_next(&self) -> bool {
        let task = self.tasks.lock().unwrap().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    pub(crate) fn run_all(&self) {
        while self.run_next() {}
    }
}

#[cfg(test)]
impl Scheduler for ManualScheduler {
    fn schedule(&self, task: Task) {
        self.tasks.lock().unwrap().push_back(task);
    }

    fn name(&self) -> &'static str {
        "manual"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_direct_runs_inline() {
        let counter = Arc::new(AtomicUsize::new(0));
        let task_counter = counter.clone();

        DirectScheduler.schedule(Box::new(move || {
            task_counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_executor_requires_runtime_context() {
        assert!(ExecutorScheduler::current().is_err());
    }

    #[tokio::test]
    async fn test_executor_runs_on_blocking_pool() {
        let scheduler = ExecutorScheduler::current().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();

        scheduler.schedule(Box::new(move || {
            let _ = tx.send(std::thread::current().id());
        }));

        let worker = rx.await.unwrap();
        assert_ne!(worker, std::thread::current().id());
        assert_eq!(scheduler.name(), "executor");
    }
}
