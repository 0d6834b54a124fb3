//! Configuration module for the sentinel.

mod app_config;
mod helpers;
mod http_retry;
mod interests;
mod server;
mod sinks;

pub use app_config::{AppConfig, ConfigError, EndpointFailurePolicy, MATRIX_TOKEN_ENV};
pub use helpers::{deserialize_duration_from_ms, deserialize_duration_from_seconds, deserialize_ws_urls};
pub use http_retry::{HttpRetryConfig, JitterSetting};
pub use interests::{AccountSpec, MethodFilterSpec, build_interests, normalize_address};
pub use server::ServerConfig;
pub use sinks::{EmailConfig, MatrixConfig, SinksConfig, SmtpConfig, SmtpSecurity};
