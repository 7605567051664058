use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Bounded retry with a fixed pause between attempts.
///
/// The policy is plain data; `run` applies it to any async operation whose
/// `Err` values are all considered transient. Permanent outcomes should be
/// expressed in the operation's `Ok` type instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Pause between consecutive attempts for the same operation
    pub delay: Duration,
}

/// Returned when every attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Single attempt, no retry
    pub fn none() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Run `op` until it succeeds or attempts run out. `op` receives the
    /// 1-based attempt number. On success the attempt count is returned too.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<(T, u32), RetryExhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok((value, attempt)),
                Err(err) if self.should_retry(attempt) => {
                    debug!(attempt, max = self.max_attempts, "attempt failed, retrying: {}", err);
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    attempt += 1;
                }
                Err(err) => {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: err,
                    })
                }
            }
        }
    }
}
