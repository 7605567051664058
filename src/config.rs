use crate::constants::{
    default_tracked_badges, DEFAULT_ACCEPTANCE_PHRASE, DEFAULT_CONCURRENCY,
    DEFAULT_REQUEST_DELAY_MS, DEFAULT_RETRY_DELAY_MS, DEFAULT_RETRY_LIMIT,
    DEFAULT_TIMEOUT_SECONDS, DEFAULT_USER_AGENT,
};
use crate::error::{QualifierError, Result};
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

pub const ENV_CANONICAL_DOMAIN: &str = "QUALIFIER_CANONICAL_DOMAIN";
pub const ENV_TARGET_YEAR: &str = "QUALIFIER_TARGET_YEAR";
pub const ENV_RETRY_LIMIT: &str = "QUALIFIER_RETRY_LIMIT";
pub const ENV_REQUEST_DELAY_MS: &str = "QUALIFIER_REQUEST_DELAY_MS";

/// On-disk configuration. Every field is optional so layers can be merged.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub organization: OrganizationConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub badges: BadgesConfig,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct OrganizationConfig {
    pub canonical_domain: Option<String>,
    pub target_year: Option<i32>,
    pub acceptance_phrase: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct EnrichmentConfig {
    pub retry_limit: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub request_delay_ms: Option<u64>,
    pub timeout_seconds: Option<u64>,
    pub concurrency: Option<u32>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct BadgesConfig {
    pub tracked: Option<Vec<String>>,
}

impl Config {
    /// Load the TOML file at `path`. A missing file yields the empty config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let config_content = fs::read_to_string(path).map_err(|e| {
            QualifierError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&config_content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Overlay values from `QUALIFIER_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(domain) = lookup(ENV_CANONICAL_DOMAIN) {
            self.organization.canonical_domain = Some(domain);
        }
        if let Some(year) = lookup(ENV_TARGET_YEAR) {
            self.organization.target_year = Some(parse_var(ENV_TARGET_YEAR, &year)?);
        }
        if let Some(limit) = lookup(ENV_RETRY_LIMIT) {
            self.enrichment.retry_limit = Some(parse_var(ENV_RETRY_LIMIT, &limit)?);
        }
        if let Some(delay) = lookup(ENV_REQUEST_DELAY_MS) {
            self.enrichment.request_delay_ms = Some(parse_var(ENV_REQUEST_DELAY_MS, &delay)?);
        }
        Ok(())
    }

    /// Fetch settings alone; enough for runs that never classify
    pub fn enrichment_settings(&self) -> Result<EnrichmentSettings> {
        let retry_limit = self.enrichment.retry_limit.unwrap_or(DEFAULT_RETRY_LIMIT);
        if retry_limit == 0 {
            return Err(QualifierError::Config("retry_limit must be at least 1".into()));
        }
        let concurrency = self.enrichment.concurrency.unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(QualifierError::Config("concurrency must be at least 1".into()));
        }

        Ok(EnrichmentSettings {
            retry_policy: RetryPolicy::fixed(
                retry_limit,
                Duration::from_millis(
                    self.enrichment.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS),
                ),
            ),
            request_delay: Duration::from_millis(
                self.enrichment
                    .request_delay_ms
                    .unwrap_or(DEFAULT_REQUEST_DELAY_MS),
            ),
            timeout: Duration::from_secs(
                self.enrichment
                    .timeout_seconds
                    .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            ),
            concurrency,
            user_agent: self
                .enrichment
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }

    pub fn tracked_badges(&self) -> Vec<String> {
        self.badges
            .tracked
            .clone()
            .unwrap_or_else(default_tracked_badges)
    }

    /// Validate and freeze into the context handed to every component
    pub fn into_run_context(self) -> Result<RunContext> {
        let enrichment = self.enrichment_settings()?;
        let tracked_badges = self.tracked_badges();
        let canonical_domain = self
            .organization
            .canonical_domain
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| QualifierError::Config("canonical domain is not configured".into()))?;
        let target_year = self
            .organization
            .target_year
            .ok_or_else(|| QualifierError::Config("target year is not configured".into()))?;

        Ok(RunContext {
            canonical_domain,
            target_year,
            acceptance_phrase: self
                .organization
                .acceptance_phrase
                .unwrap_or_else(|| DEFAULT_ACCEPTANCE_PHRASE.to_string()),
            enrichment,
            tracked_badges,
        })
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| QualifierError::Config(format!("{} has invalid value '{}'", key, raw)))
}

/// How profiles are fetched: retry, pacing and the per-request timeout
#[derive(Debug, Clone)]
pub struct EnrichmentSettings {
    pub retry_policy: RetryPolicy,
    /// Minimum gap between any two external calls
    pub request_delay: Duration,
    pub timeout: Duration,
    pub concurrency: u32,
    pub user_agent: String,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::fixed(
                DEFAULT_RETRY_LIMIT,
                Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            ),
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            concurrency: DEFAULT_CONCURRENCY,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Validated settings for one run, passed explicitly into each component
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Lowercased organization domain, or an email suffix when it contains `@`
    pub canonical_domain: String,
    pub target_year: i32,
    pub acceptance_phrase: String,
    pub enrichment: EnrichmentSettings,
    pub tracked_badges: Vec<String>,
}

impl RunContext {
    /// Context with default enrichment settings, mostly useful in tests
    pub fn new(canonical_domain: &str, target_year: i32) -> Self {
        Self {
            canonical_domain: canonical_domain.trim().to_lowercase(),
            target_year,
            acceptance_phrase: DEFAULT_ACCEPTANCE_PHRASE.to_string(),
            enrichment: EnrichmentSettings::default(),
            tracked_badges: default_tracked_badges(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.enrichment.retry_policy = policy;
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.enrichment.request_delay = delay;
        self
    }

    pub fn with_concurrency(mut self, concurrency: u32) -> Self {
        self.enrichment.concurrency = concurrency.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_full_toml_config() {
        let config = Config::from_toml(
            r#"
            [organization]
            canonical_domain = "GDG.org "
            target_year = 2025
            acceptance_phrase = "Yes, I accept"

            [enrichment]
            retry_limit = 5
            retry_delay_ms = 10
            request_delay_ms = 20
            concurrency = 2

            [badges]
            tracked = ["Prompt Design in Vertex AI"]
            "#,
        )
        .unwrap();

        let ctx = config.into_run_context().unwrap();
        assert_eq!(ctx.canonical_domain, "gdg.org");
        assert_eq!(ctx.target_year, 2025);
        assert_eq!(ctx.acceptance_phrase, "Yes, I accept");
        assert_eq!(ctx.enrichment.retry_policy.max_attempts, 5);
        assert_eq!(ctx.enrichment.retry_policy.delay, Duration::from_millis(10));
        assert_eq!(ctx.enrichment.request_delay, Duration::from_millis(20));
        assert_eq!(ctx.enrichment.concurrency, 2);
        assert_eq!(ctx.tracked_badges, vec!["Prompt Design in Vertex AI"]);
    }

    #[test]
    fn test_defaults_fill_enrichment_settings() {
        let ctx = RunContext::new("gdg.org", 2025);
        assert_eq!(ctx.enrichment.retry_policy.max_attempts, DEFAULT_RETRY_LIMIT);
        assert_eq!(ctx.enrichment.request_delay, Duration::from_millis(DEFAULT_REQUEST_DELAY_MS));
        assert_eq!(ctx.tracked_badges.len(), 20);
    }

    #[test]
    fn test_missing_domain_is_fatal() {
        let mut config = Config::default();
        config.organization.target_year = Some(2025);
        let err = config.into_run_context().unwrap_err();
        assert!(matches!(err, QualifierError::Config(_)));
        assert!(err.to_string().contains("canonical domain"));
    }

    #[test]
    fn test_missing_target_year_is_fatal() {
        let mut config = Config::default();
        config.organization.canonical_domain = Some("gdg.org".into());
        let err = config.into_run_context().unwrap_err();
        assert!(err.to_string().contains("target year"));
    }

    #[test]
    fn test_zero_retry_limit_rejected() {
        let mut config = Config::from_toml("[enrichment]\nretry_limit = 0").unwrap();
        config.organization.canonical_domain = Some("gdg.org".into());
        config.organization.target_year = Some(2025);
        assert!(config.into_run_context().is_err());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config::from_toml(
            "[organization]\ncanonical_domain = \"old.org\"\ntarget_year = 2024",
        )
        .unwrap();
        let vars: HashMap<&str, &str> = [
            (ENV_CANONICAL_DOMAIN, "new.org"),
            (ENV_TARGET_YEAR, "2025"),
            (ENV_RETRY_LIMIT, "4"),
        ]
        .into_iter()
        .collect();
        config
            .apply_vars(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        let ctx = config.into_run_context().unwrap();
        assert_eq!(ctx.canonical_domain, "new.org");
        assert_eq!(ctx.target_year, 2025);
        assert_eq!(ctx.enrichment.retry_policy.max_attempts, 4);
    }

    #[test]
    fn test_invalid_env_value_is_config_error() {
        let mut config = Config::default();
        let err = config
            .apply_vars(|key| (key == ENV_TARGET_YEAR).then(|| "next year".to_string()))
            .unwrap_err();
        assert!(matches!(err, QualifierError::Config(_)));
    }

    #[test]
    fn test_enrichment_settings_without_organization() {
        let config = Config::from_toml("[enrichment]\nconcurrency = 3").unwrap();
        let settings = config.enrichment_settings().unwrap();
        assert_eq!(settings.concurrency, 3);
        assert_eq!(settings.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECONDS));
        assert_eq!(config.tracked_badges().len(), 20);
    }

    #[test]
    fn test_missing_file_yields_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert!(config.organization.canonical_domain.is_none());
    }
}
