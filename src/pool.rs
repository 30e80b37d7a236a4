//! Bounded fire-and-forget worker pool.
//!
//! Each assessment runs in its own task; the semaphore caps how many run
//! at once so load cannot spawn unbounded concurrent workers. Dispatch
//! returns immediately; the permit is acquired inside the spawned task so
//! the HTTP layer never blocks on a full pool.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::error;

#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Spawn `work` once a permit frees up. The handle is returned for
    /// tests; production callers drop it (fire and forget).
    pub fn dispatch<F>(&self, work: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let semaphore = self.semaphore.clone();
        tokio::spawn(async move {
            match semaphore.acquire_owned().await {
                Ok(_permit) => work.await,
                // Only reachable if the pool is torn down mid-shutdown.
                Err(e) => error!(error = %e, "worker pool closed, task dropped"),
            }
        })
    }

    #[cfg(test)]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}
