use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

#[derive(Clone, Debug, Default)]
pub struct Limits {
    /// Lower bound on the time between the starts of two external calls
    pub min_interval: Duration,
    /// Maximum number of calls in flight at once
    pub concurrency: Option<u32>,
}

/// Process-wide limiter for calls to the profile host. Clones share state, so
/// one limiter spaces calls across every worker.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    limits: Limits,
    // start time of the most recent call
    last_call: Mutex<Option<Instant>>,
    sem: Option<Arc<Semaphore>>,
}

/// Held for the duration of one external call; releases its concurrency slot on drop
#[derive(Debug)]
pub struct RatePermit {
    _permit: Option<OwnedSemaphorePermit>,
}

impl RateLimiter {
    pub fn new(limits: Limits) -> Self {
        let sem = limits
            .concurrency
            .map(|c| Arc::new(Semaphore::new(c.max(1) as usize)));
        Self {
            inner: Arc::new(Inner {
                limits,
                last_call: Mutex::new(None),
                sem,
            }),
        }
    }

    pub fn with_interval(min_interval: Duration, concurrency: u32) -> Self {
        Self::new(Limits {
            min_interval,
            concurrency: Some(concurrency),
        })
    }

    /// Wait for a concurrency slot, then until `min_interval` has passed since
    /// the previous call started.
    pub async fn acquire(&self) -> RatePermit {
        // Concurrency first
        let permit = match &self.inner.sem {
            Some(sem) => sem.clone().acquire_owned().await.ok(),
            None => None,
        };

        // The lock is held across the sleep so waiting callers queue up behind
        // it and each one measures from the call that went before it.
        let mut last = self.inner.last_call.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.inner.limits.min_interval {
                tokio::time::sleep(self.inner.limits.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());

        RatePermit { _permit: permit }
    }
}
