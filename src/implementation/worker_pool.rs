//! Worker pool.
//!
//! Enqueues fire-and-forget work items. Every `Publisher::publish` enqueues
//! exactly one work item per call, never a recurring one.

use std::future::Future;

/// A handle to the process-wide fire-and-forget dispatcher. Cheap to
/// clone, it carries no state of its own; `async_std`'s executor is a
/// global.
#[derive(Clone, Default)]
pub struct WorkerPool;

impl WorkerPool {
    pub fn new() -> Self {
        Self
    }

    /// Enqueues `task` for execution off the calling thread.
    /// `async_std::task::spawn` never blocks the caller to schedule.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        async_std::task::spawn(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn spawned_task_eventually_runs() {
        async_std::task::block_on(async {
            let pool = WorkerPool::new();
            let ran = Arc::new(AtomicBool::new(false));
            let ran2 = ran.clone();
            let (tx, rx) = async_std::channel::bounded(1);
            pool.spawn(async move {
                ran2.store(true, Ordering::SeqCst);
                let _ = tx.send(()).await;
            });
            rx.recv().await.unwrap();
            assert!(ran.load(Ordering::SeqCst));
        });
    }
}
