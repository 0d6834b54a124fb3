//! Retrying HTTP clients for the sinks that talk HTTP.

mod client;
mod pool;

pub use client::create_retryable_http_client;
pub use pool::{HttpClientPool, HttpClientPoolError};
