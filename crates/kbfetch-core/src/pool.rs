//! Bounded worker pool
//!
//! Jobs are spawned onto the tokio runtime immediately, then wait for a
//! permit before running. Submission never blocks the caller; at most
//! `capacity` jobs of one pool run at the same time.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::trace;

/// Permits of the process-wide pool used by file fetches
pub const FILE_FETCH_CONCURRENCY: usize = 4;

static FILE_FETCH_POOL: OnceLock<WorkerPool> = OnceLock::new();

/// A named pool with a fixed number of concurrent slots
#[derive(Clone, Debug)]
pub struct WorkerPool {
    name: &'static str,
    capacity: usize,
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    /// Create a pool; a capacity of 0 is raised to 1
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name,
            capacity,
            permits: Arc::new(Semaphore::new(capacity)),
        }
    }

    /// Pool shared by every file fetch that was not given its own
    pub fn file_fetch() -> WorkerPool {
        FILE_FETCH_POOL
            .get_or_init(|| WorkerPool::new("file-fetch", FILE_FETCH_CONCURRENCY))
            .clone()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not taken by a running job right now
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Queue a job. Must be called from within a tokio runtime.
    pub fn spawn<F>(&self, job: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let name = self.name;
        tokio::spawn(async move {
            // The semaphore is never closed, so this only fails if it were.
            let _permit = permits.acquire_owned().await.ok();
            trace!(pool = name, "job acquired a slot");
            job.await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn never_runs_more_than_capacity() {
        let pool = WorkerPool::new("test", 2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            handles.push(pool.spawn(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn spawn_returns_job_output() {
        let pool = WorkerPool::new("test", 0);
        assert_eq!(pool.capacity(), 1);
        assert_eq!(pool.spawn(async { 7 }).await.unwrap(), 7);
    }

    #[test]
    fn file_fetch_pool_is_shared() {
        let a = WorkerPool::file_fetch();
        let b = WorkerPool::file_fetch();
        assert!(Arc::ptr_eq(&a.permits, &b.permits));
        assert_eq!(a.capacity(), FILE_FETCH_CONCURRENCY);
    }
}
