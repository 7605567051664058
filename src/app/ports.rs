use crate::rate_limiter::RatePermit;
use async_trait::async_trait;
use thiserror::Error;

/// Fetches a single page from the profile host
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpGetResult, TransportError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpGetResult {
    pub status: u16,
    pub body: String,
}

impl HttpGetResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The page does not exist; retrying will not help
    pub fn is_not_found(&self) -> bool {
        self.status == 404 || self.status == 410
    }
}

/// The request never produced a response (connect, TLS, timeout, body read)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub timed_out: bool,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }
}

#[async_trait]
pub trait RateLimiterPort: Send + Sync {
    async fn acquire(&self) -> RatePermit;
}
