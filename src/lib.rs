pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod rate_limiter;
pub mod retry;
pub mod types;

// Observability
pub mod observability;

// Ports and their adapters
pub mod app;
pub mod infra;
