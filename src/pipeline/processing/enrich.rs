use crate::app::ports::{HttpClientPort, RateLimiterPort};
use crate::config::EnrichmentSettings;
use crate::infra::rate_limiter_adapter::RateLimiterAdapter;
use crate::observability::metrics;
use crate::parser::{parse_profile, ParsedProfile};
use crate::rate_limiter::RateLimiter;
use crate::retry::RetryPolicy;
use crate::types::{FetchStatus, ProfileSnapshot};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

/// What one successful round trip told us about the page
#[derive(Debug, Clone, PartialEq, Eq)]
enum PageOutcome {
    Found(ParsedProfile),
    NotFound,
}

/// Full result of enriching one profile URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFetch {
    pub status: FetchStatus,
    /// Parsed page, present only when `status` is `Ok`
    pub profile: Option<ParsedProfile>,
    /// External calls made for this URL
    pub attempts: u32,
    /// Last transient error when retries ran out
    pub error: Option<String>,
}

impl ProfileFetch {
    pub fn skipped_no_url() -> Self {
        Self {
            status: FetchStatus::SkippedNoUrl,
            profile: None,
            attempts: 0,
            error: None,
        }
    }

    pub fn failed(attempts: u32, error: impl Into<String>) -> Self {
        Self {
            status: FetchStatus::FetchFailed,
            profile: None,
            attempts,
            error: Some(error.into()),
        }
    }

    /// Reduce to the snapshot the classifier consumes
    pub fn snapshot(&self) -> ProfileSnapshot {
        match &self.profile {
            Some(profile) if self.status == FetchStatus::Ok => ProfileSnapshot {
                creation_year: profile.creation_year,
                badge_count: profile.badge_count(),
                league: profile.league.clone().unwrap_or_default(),
                points: profile.points,
                identity: profile.identity.clone(),
                fetch_status: FetchStatus::Ok,
                attempts: self.attempts,
            },
            _ => ProfileSnapshot {
                attempts: self.attempts,
                ..ProfileSnapshot::without_profile(self.status)
            },
        }
    }
}

/// Fetches and parses public profiles under a retry policy and a shared rate limiter
pub struct ProfileEnricher {
    http: Arc<dyn HttpClientPort>,
    limiter: Arc<dyn RateLimiterPort>,
    policy: RetryPolicy,
    concurrency: usize,
}

impl ProfileEnricher {
    pub fn new(
        http: Arc<dyn HttpClientPort>,
        limiter: Arc<dyn RateLimiterPort>,
        policy: RetryPolicy,
        concurrency: usize,
    ) -> Self {
        Self {
            http,
            limiter,
            policy,
            concurrency: concurrency.max(1),
        }
    }

    /// Enricher wired with a fresh global limiter built from the settings
    pub fn from_settings(settings: &EnrichmentSettings, http: Arc<dyn HttpClientPort>) -> Self {
        let limiter = RateLimiter::with_interval(settings.request_delay, settings.concurrency);
        Self::new(
            http,
            Arc::new(RateLimiterAdapter(limiter)),
            settings.retry_policy,
            settings.concurrency as usize,
        )
    }

    /// Fetch one profile. Never fails: errors degrade into the returned status.
    #[instrument(skip(self))]
    pub async fn fetch_profile(&self, url: Option<&str>) -> ProfileFetch {
        let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
            return ProfileFetch::skipped_no_url();
        };

        let http = &self.http;
        let limiter = &self.limiter;
        let result = self
            .policy
            .run(|attempt| async move {
                let _permit = limiter.acquire().await;
                metrics::fetch_attempt();
                if attempt > 1 {
                    metrics::fetch_retry();
                }
                debug!(attempt, "Fetching profile");

                let response = http.get(url).await.map_err(|e| {
                    warn!(attempt, timed_out = e.timed_out, "Attempt {} failed for {}: {}", attempt, url, e);
                    e.to_string()
                })?;

                if response.is_success() {
                    Ok(PageOutcome::Found(parse_profile(&response.body)))
                } else if response.is_not_found() {
                    Ok(PageOutcome::NotFound)
                } else {
                    warn!(attempt, status = response.status, "Attempt {} failed for {}", attempt, url);
                    Err(format!("HTTP status {}", response.status))
                }
            })
            .await;

        match result {
            Ok((PageOutcome::Found(profile), attempts)) => {
                metrics::fetch_succeeded();
                ProfileFetch {
                    status: FetchStatus::Ok,
                    profile: Some(profile),
                    attempts,
                    error: None,
                }
            }
            Ok((PageOutcome::NotFound, attempts)) => {
                info!("Profile not found: {}", url);
                metrics::fetch_not_found();
                ProfileFetch {
                    status: FetchStatus::NotFound,
                    profile: None,
                    attempts,
                    error: None,
                }
            }
            Err(exhausted) => {
                warn!(
                    attempts = exhausted.attempts,
                    "Giving up on {}: {}", url, exhausted.last_error
                );
                metrics::fetch_failed();
                ProfileFetch::failed(exhausted.attempts, exhausted.last_error)
            }
        }
    }

    pub async fn enrich(&self, url: Option<&str>) -> ProfileSnapshot {
        self.fetch_profile(url).await.snapshot()
    }

    /// Fetch many profiles with bounded concurrency. Keys are caller-chosen
    /// (row numbers); a job whose task dies is reported as `fetch_failed`.
    pub async fn fetch_all(
        self: &Arc<Self>,
        jobs: Vec<(usize, Option<String>)>,
    ) -> HashMap<usize, ProfileFetch> {
        let total = jobs.len();
        let mut results = HashMap::with_capacity(total);
        let mut pending: Vec<usize> = jobs.iter().map(|(key, _)| *key).collect();
        let mut set = JoinSet::new();

        for (done, (key, url)) in jobs.into_iter().enumerate() {
            if set.len() >= self.concurrency {
                collect_next(&mut set, &mut results).await;
            }
            info!("Processing {}/{}", done + 1, total);
            let enricher = Arc::clone(self);
            set.spawn(async move {
                let fetch = enricher.fetch_profile(url.as_deref()).await;
                (key, fetch)
            });
        }
        while !set.is_empty() {
            collect_next(&mut set, &mut results).await;
        }

        pending.retain(|key| !results.contains_key(key));
        for key in pending {
            results.insert(key, ProfileFetch::failed(0, "enrichment task aborted"));
        }
        results
    }
}

async fn collect_next(
    set: &mut JoinSet<(usize, ProfileFetch)>,
    results: &mut HashMap<usize, ProfileFetch>,
) {
    match set.join_next().await {
        Some(Ok((key, fetch))) => {
            results.insert(key, fetch);
        }
        Some(Err(e)) => error!("Enrichment task failed: {}", e),
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{HttpGetResult, TransportError};
    use crate::rate_limiter::RatePermit;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// Replays scripted responses in order, repeating the last one
    struct ScriptedHttp {
        script: Mutex<Vec<Result<HttpGetResult, TransportError>>>,
        calls: AtomicU32,
    }

    impl ScriptedHttp {
        fn new(script: Vec<Result<HttpGetResult, TransportError>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpClientPort for ScriptedHttp {
        async fn get(&self, _url: &str) -> Result<HttpGetResult, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            }
        }
    }

    fn ok(body: &str) -> Result<HttpGetResult, TransportError> {
        Ok(HttpGetResult {
            status: 200,
            body: body.to_string(),
        })
    }

    fn status(code: u16) -> Result<HttpGetResult, TransportError> {
        Ok(HttpGetResult {
            status: code,
            body: String::new(),
        })
    }

    fn enricher(http: Arc<ScriptedHttp>, attempts: u32) -> ProfileEnricher {
        let limiter = RateLimiter::with_interval(Duration::ZERO, 1);
        ProfileEnricher::new(
            http,
            Arc::new(RateLimiterAdapter(limiter)),
            RetryPolicy::fixed(attempts, Duration::ZERO),
            1,
        )
    }

    #[tokio::test]
    async fn test_blank_url_makes_no_call() {
        let http = Arc::new(ScriptedHttp::new(vec![ok("")]));
        let enricher = enricher(http.clone(), 3);

        let fetch = enricher.fetch_profile(Some("   ")).await;
        assert_eq!(fetch.status, FetchStatus::SkippedNoUrl);
        let fetch = enricher.fetch_profile(None).await;
        assert_eq!(fetch.status, FetchStatus::SkippedNoUrl);
        assert_eq!(http.calls(), 0);
    }

    #[tokio::test]
    async fn test_successful_fetch_builds_snapshot() {
        let http = Arc::new(ScriptedHttp::new(vec![ok(
            r#"<p class="ql-body-large l-mbl">Member since 2025</p>"#,
        )]));
        let snapshot = enricher(http, 3).enrich(Some("https://p/1")).await;

        assert_eq!(snapshot.fetch_status, FetchStatus::Ok);
        assert_eq!(snapshot.creation_year, Some(2025));
        assert_eq!(snapshot.badge_count, 0);
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_permanent_failure_stops_at_retry_limit() {
        let http = Arc::new(ScriptedHttp::new(vec![Err(TransportError::new("timeout"))]));
        let fetch = enricher(http.clone(), 3).fetch_profile(Some("https://p/1")).await;

        assert_eq!(fetch.status, FetchStatus::FetchFailed);
        assert_eq!(fetch.attempts, 3);
        assert_eq!(fetch.error.as_deref(), Some("timeout"));
        assert_eq!(http.calls(), 3);
    }

    #[tokio::test]
    async fn test_server_error_retried_then_recovers() {
        let http = Arc::new(ScriptedHttp::new(vec![
            status(503),
            status(500),
            ok("<p>Member since 2024</p>"),
        ]));
        let fetch = enricher(http.clone(), 3).fetch_profile(Some("https://p/1")).await;

        assert_eq!(fetch.status, FetchStatus::Ok);
        assert_eq!(fetch.attempts, 3);
        assert_eq!(fetch.snapshot().creation_year, Some(2024));
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let http = Arc::new(ScriptedHttp::new(vec![status(404)]));
        let fetch = enricher(http.clone(), 3).fetch_profile(Some("https://p/gone")).await;

        assert_eq!(fetch.status, FetchStatus::NotFound);
        assert_eq!(http.calls(), 1);
        assert_eq!(fetch.snapshot().badge_count, 0);
    }

    #[tokio::test]
    async fn test_courtesy_delay_spans_records() {
        let http = Arc::new(ScriptedHttp::new(vec![ok("")]));
        let limiter = RateLimiter::with_interval(Duration::from_millis(30), 2);
        let enricher = Arc::new(ProfileEnricher::new(
            http.clone(),
            Arc::new(RateLimiterAdapter(limiter)),
            RetryPolicy::none(),
            2,
        ));

        let started = Instant::now();
        let jobs = (1..=4).map(|i| (i, Some(format!("https://p/{}", i)))).collect();
        let results = enricher.fetch_all(jobs).await;

        assert_eq!(results.len(), 4);
        assert_eq!(http.calls(), 4);
        assert!(started.elapsed() >= Duration::from_millis(90));
    }

    struct CountingLimiter(AtomicU32);

    #[async_trait]
    impl RateLimiterPort for CountingLimiter {
        async fn acquire(&self) -> RatePermit {
            self.0.fetch_add(1, Ordering::SeqCst);
            RateLimiter::with_interval(Duration::ZERO, 1).acquire().await
        }
    }

    #[tokio::test]
    async fn test_every_attempt_passes_through_limiter() {
        let http = Arc::new(ScriptedHttp::new(vec![status(500)]));
        let limiter = Arc::new(CountingLimiter(AtomicU32::new(0)));
        let enricher = ProfileEnricher::new(
            http,
            limiter.clone(),
            RetryPolicy::fixed(3, Duration::ZERO),
            1,
        );

        enricher.fetch_profile(Some("https://p/1")).await;
        assert_eq!(limiter.0.load(Ordering::SeqCst), 3);
    }
}
