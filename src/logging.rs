use std::fs;
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const DEFAULT_LOG_DIR: &str = "logs";
const LOG_FILE: &str = "qualifier.log";
const DEFAULT_DIRECTIVE: &str = "badge_qualifier=info";

/// Initializes the logging system with both console and file output.
pub fn init_logging(log_dir: &Path) {
    // Ensure logs directory exists
    let _ = fs::create_dir_all(log_dir);

    // Daily-rotated JSON file, written off the calling thread
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);

    // Console goes to stderr so stdout carries only the summary
    let console_layer = fmt::layer().with_writer(std::io::stderr);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    // Keep the guard alive for the life of the process so logs are flushed
    std::mem::forget(guard);
}
