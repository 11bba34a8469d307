// ABOUTME: Bounded worker pool shared by all execution drivers
// ABOUTME: Semaphore-based concurrency cap with resource usage statistics

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone)]
pub struct WorkerPool {
    max_concurrent: usize,
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    /// Creates a pool capping the number of operations truly running in
    /// parallel across every execution that shares it.
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            max_concurrent,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Waits for a worker slot. The slot is released when the permit drops,
    /// including when a timed-out task future is abandoned.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("worker pool semaphore closed")
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn stats(&self) -> PoolStats {
        let available_permits = self.semaphore.available_permits();
        PoolStats {
            max_concurrent: self.max_concurrent,
            available_permits,
            active_tasks: self.max_concurrent - available_permits,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolStats {
    pub max_concurrent: usize,
    pub available_permits: usize,
    pub active_tasks: usize,
}

impl PoolStats {
    pub fn utilization_percentage(&self) -> f64 {
        if self.max_concurrent == 0 {
            0.0
        } else {
            self.active_tasks as f64 / self.max_concurrent as f64 * 100.0
        }
    }
}
