use std::future::Future;
use tokio::sync::{AcquireError, Semaphore};

/// Global cap on in-flight tool calls. Waiters are served in FIFO order.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    max: usize,
    sem: Semaphore,
}

impl ConcurrencyLimiter {
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            max,
            sem: Semaphore::new(max),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.max - self.sem.available_permits()
    }

    /// Runs `fut` while holding a slot. The slot is released when the permit
    /// drops, including when the returned future itself is dropped mid-flight.
    /// `fut` never runs without a slot; a closed limiter is an error.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, AcquireError> {
        let _permit = self.sem.acquire().await?;
        Ok(fut.await)
    }

    #[cfg(test)]
    fn close(&self) {
        self.sem.close();
    }
}
