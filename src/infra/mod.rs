// Adapters implementing the app ports

pub mod http_client;
pub mod rate_limiter_adapter;
