use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

pub const DEFAULT_MAX_PARALLEL_REQUESTS: usize = 1;

/// Bounds the number of page tasks that fetch at the same time
#[derive(Debug, Clone)]
pub struct Limiter {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

/// Capacity held by one running task, given back on drop
#[derive(Debug)]
pub struct Permit {
    _permit: OwnedSemaphorePermit,
}

impl Limiter {
    /// A limit of 0 would never hand out a permit, so it falls back to the default
    pub fn new(limit: usize) -> Self {
        let limit = if limit == 0 {
            DEFAULT_MAX_PARALLEL_REQUESTS
        } else {
            limit
        };
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Wait until fewer than `limit` permits are out.
    /// Fails once the limiter is closed.
    pub async fn acquire(&self) -> Result<Permit, AcquireError> {
        let permit = self.semaphore.clone().acquire_owned().await?;
        Ok(Permit { _permit: permit })
    }

    /// Wake every waiter with an error, used when the crawl is done
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
