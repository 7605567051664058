use crate::app::ports::{HttpClientPort, HttpGetResult, TransportError};
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// reqwest-backed page fetcher. The timeout governs one attempt only.
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .gzip(true)
            .deflate(true)
            .build()?;
        Ok(Self { client })
    }
}

fn transport_error(e: reqwest::Error) -> TransportError {
    TransportError {
        timed_out: e.is_timeout(),
        message: e.to_string(),
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn get(&self, url: &str) -> std::result::Result<HttpGetResult, TransportError> {
        let resp = self.client.get(url).send().await.map_err(transport_error)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(transport_error)?;
        Ok(HttpGetResult { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_get_returns_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/public_profiles/abc")
                    .header("user-agent", "qualifier-test");
                then.status(200).body("<html>Member since 2025</html>");
            })
            .await;

        let http = ReqwestHttp::new(Duration::from_secs(5), "qualifier-test").unwrap();
        let result = http
            .get(&format!("{}/public_profiles/abc", server.base_url()))
            .await
            .unwrap();

        assert!(result.is_success());
        assert!(result.body.contains("Member since 2025"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_not_a_transport_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missing");
                then.status(404);
            })
            .await;

        let http = ReqwestHttp::new(Duration::from_secs(5), "qualifier-test").unwrap();
        let result = http
            .get(&format!("{}/missing", server.base_url()))
            .await
            .unwrap();

        assert!(!result.is_success());
        assert!(result.is_not_found());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let http = ReqwestHttp::new(Duration::from_millis(500), "qualifier-test").unwrap();
        let result = http.get("http://127.0.0.1:1/profile").await;
        assert!(result.is_err());
    }
}
