//! Named counters for the qualification run.
//!
//! Recording goes through the `metrics` facade, so every call is a no-op
//! until `init` installs the Prometheus recorder.

use crate::types::QualificationStatus;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::info;

pub const ENV_METRICS_PORT: &str = "QUALIFIER_METRICS_PORT";

/// Every metric name the crate records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Loader
    RowsLoaded,
    RowsSkipped,

    // Enricher
    FetchAttempts,
    FetchRetries,
    FetchSuccess,
    FetchNotFound,
    FetchFailed,

    // Classifier
    RecordsClassified,

    // Run
    RunDuration,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RowsLoaded => "qualifier_rows_loaded_total",
            MetricName::RowsSkipped => "qualifier_rows_skipped_total",
            MetricName::FetchAttempts => "qualifier_fetch_attempts_total",
            MetricName::FetchRetries => "qualifier_fetch_retries_total",
            MetricName::FetchSuccess => "qualifier_fetch_success_total",
            MetricName::FetchNotFound => "qualifier_fetch_not_found_total",
            MetricName::FetchFailed => "qualifier_fetch_failed_total",
            MetricName::RecordsClassified => "qualifier_records_classified_total",
            MetricName::RunDuration => "qualifier_run_duration_seconds",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            RowsLoaded,
            RowsSkipped,
            FetchAttempts,
            FetchRetries,
            FetchSuccess,
            FetchNotFound,
            FetchFailed,
            RecordsClassified,
            RunDuration,
        ]
        .into_iter()
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. With `QUALIFIER_METRICS_PORT` set, an
/// HTTP listener serves `/metrics` on that port; otherwise the handle is kept
/// for `render`. Must be called from inside a tokio runtime.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    match std::env::var(ENV_METRICS_PORT) {
        Ok(port) if !port.trim().is_empty() => {
            let port: u16 = port.trim().parse()?;
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
                .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))?;
            info!("Metrics exporter listening on {}", addr);
        }
        _ => {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
            METRICS_HANDLE.set(handle).ok();
            info!("Metrics system initialized (no exporter)");
        }
    }
    Ok(())
}

/// Current metrics in Prometheus text format, when a local recorder is installed
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

pub fn row_loaded() {
    ::metrics::counter!(MetricName::RowsLoaded.as_str()).increment(1);
}

pub fn row_skipped() {
    ::metrics::counter!(MetricName::RowsSkipped.as_str()).increment(1);
}

pub fn fetch_attempt() {
    ::metrics::counter!(MetricName::FetchAttempts.as_str()).increment(1);
}

pub fn fetch_retry() {
    ::metrics::counter!(MetricName::FetchRetries.as_str()).increment(1);
}

pub fn fetch_succeeded() {
    ::metrics::counter!(MetricName::FetchSuccess.as_str()).increment(1);
}

pub fn fetch_not_found() {
    ::metrics::counter!(MetricName::FetchNotFound.as_str()).increment(1);
}

pub fn fetch_failed() {
    ::metrics::counter!(MetricName::FetchFailed.as_str()).increment(1);
}

pub fn record_classified(status: QualificationStatus) {
    ::metrics::counter!(MetricName::RecordsClassified.as_str(), "status" => status.as_str())
        .increment(1);
}

pub fn record_run_duration(elapsed: Duration) {
    ::metrics::histogram!(MetricName::RunDuration.as_str()).record(elapsed.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_metric_names_are_unique_and_prefixed() {
        let names: HashSet<&str> = MetricName::all_metrics().map(|m| m.as_str()).collect();
        assert_eq!(names.len(), MetricName::all_metrics().count());
        assert!(names.iter().all(|n| n.starts_with("qualifier_")));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        row_loaded();
        record_classified(QualificationStatus::HardQualified);
        record_run_duration(Duration::from_millis(5));
    }
}
