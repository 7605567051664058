use crate::app::ports::RateLimiterPort;
use crate::rate_limiter::{RateLimiter, RatePermit};
use async_trait::async_trait;

pub struct RateLimiterAdapter(pub RateLimiter);

#[async_trait]
impl RateLimiterPort for RateLimiterAdapter {
    async fn acquire(&self) -> RatePermit {
        self.0.acquire().await
    }
}
