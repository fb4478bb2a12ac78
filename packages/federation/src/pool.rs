//! The shared worker pool channels are drained on.

use fedstore_core::Error;
use tokio::runtime::{Builder, Runtime};

/// Default number of channels drained at the same time.
pub const DEFAULT_MAX_WORKERS: usize = 16;

/// A bounded pool of blocking workers.
///
/// Tasks beyond `max_workers` wait for a free worker. Dropping the pool
/// abandons tasks that have not started.
#[derive(Debug)]
pub struct WorkerPool {
    runtime: Option<Runtime>,
    max_workers: usize,
}

impl WorkerPool {
    pub fn new(max_workers: usize) -> Result<Self, Error> {
        let max_workers = max_workers.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(max_workers)
            .thread_name("fedstore-worker")
            .build()
            .map_err(|e| Error::execution(format!("cannot start worker pool: {}", e)))?;
        tracing::debug!(max_workers, "worker pool started");
        Ok(WorkerPool {
            runtime: Some(runtime),
            max_workers,
        })
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run `task` on a pool worker.
    pub fn spawn<F>(&self, task: F) -> Result<(), Error>
    where
        F: FnOnce() + Send + 'static,
    {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| Error::execution("worker pool is shut down"))?;
        // The task's handle is not needed; completion is signalled by the task.
        drop(runtime.spawn_blocking(task));
        Ok(())
    }

    /// Stop accepting tasks and abandon those not yet started. Running
    /// tasks finish on their own threads.
    pub fn shutdown(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
            tracing::debug!("worker pool shut down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.runtime.is_none()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CompletionLatch;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn runs_tasks_in_parallel() {
        let pool = WorkerPool::new(2).unwrap();
        assert_eq!(pool.max_workers(), 2);

        // Each task waits for the other, so this only finishes if both run
        // at the same time.
        let both_started = Arc::new(CompletionLatch::new(2));
        let finished = Arc::new(CompletionLatch::new(2));
        for _ in 0..2 {
            let both_started = Arc::clone(&both_started);
            let finished = Arc::clone(&finished);
            pool.spawn(move || {
                both_started.count_down();
                both_started.wait();
                finished.count_down();
            })
            .unwrap();
        }
        finished.wait();
    }

    #[test]
    fn zero_workers_means_one() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.max_workers(), 1);

        let count = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(CompletionLatch::new(3));
        for _ in 0..3 {
            let count = Arc::clone(&count);
            let finished = Arc::clone(&finished);
            pool.spawn(move || {
                count.fetch_add(1, Ordering::SeqCst);
                finished.count_down();
            })
            .unwrap();
        }
        finished.wait();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn shut_down_pool_rejects_tasks() {
        let mut pool = WorkerPool::new(1).unwrap();
        pool.shutdown();
        pool.shutdown();
        assert!(pool.is_shut_down());
        assert!(pool.spawn(|| {}).is_err());
    }
}
