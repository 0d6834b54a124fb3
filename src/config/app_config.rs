use std::{path::Path, time::Duration};

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use super::{
    HttpRetryConfig, ServerConfig, SinksConfig,
    helpers::{deserialize_duration_from_ms, deserialize_duration_from_seconds, deserialize_ws_urls},
    interests::{AccountSpec, MethodFilterSpec, build_interests},
};
use crate::{engine::endpoint::RunnerSettings, models::Interests};

/// Environment variable that overrides the Matrix access token.
pub const MATRIX_TOKEN_ENV: &str = "MATRIX_TOKEN";

/// Errors raised while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file or the environment could not be read or parsed.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// The configuration parsed but is not usable.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// What to do when an endpoint fails for good.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EndpointFailurePolicy {
    /// Log the failure and keep the other endpoints running.
    #[default]
    Continue,
    /// Stop the whole process with an error.
    Exit,
}

fn default_resubscribe_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_max_resubscribe_attempts() -> u32 {
    10
}

fn default_header_channel_capacity() -> usize {
    64
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// WebSocket RPC endpoints, one pipeline each.
    #[serde(deserialize_with = "deserialize_ws_urls")]
    pub endpoints: Vec<Url>,

    /// Monitored accounts. Empty means every account.
    #[serde(default)]
    pub accounts: Vec<AccountSpec>,

    /// Extrinsics of interest.
    #[serde(default)]
    pub extrinsic_filter: MethodFilterSpec,

    /// Events of interest.
    #[serde(default)]
    pub event_filter: MethodFilterSpec,

    /// Notification targets.
    #[serde(default)]
    pub sinks: SinksConfig,

    /// Health probe server.
    #[serde(default)]
    pub server: ServerConfig,

    /// Wait time before resubscribing after a subscription ended.
    #[serde(
        default = "default_resubscribe_delay",
        deserialize_with = "deserialize_duration_from_ms"
    )]
    pub resubscribe_delay_ms: Duration,

    /// Consecutive failed subscriptions before an endpoint is given up.
    #[serde(default = "default_max_resubscribe_attempts")]
    pub max_resubscribe_attempts: u32,

    /// Capacity of the per-endpoint header channel.
    #[serde(default = "default_header_channel_capacity")]
    pub header_channel_capacity: usize,

    /// What to do when an endpoint is given up.
    #[serde(default)]
    pub endpoint_failure_policy: EndpointFailurePolicy,

    /// The maximum time in seconds to wait for graceful shutdown.
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub shutdown_timeout: Duration,

    /// Default retry policy for outbound HTTP calls.
    #[serde(default)]
    pub http_retry_config: HttpRetryConfig,
}

impl AppConfig {
    /// Loads the configuration from a YAML file, with `CHAIN_SENTINEL__*`
    /// environment variables layered on top, and validates it.
    pub fn new(path: &Path) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix("CHAIN_SENTINEL")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("endpoints"),
            )
            .build()?;
        let mut config: Self = settings.try_deserialize()?;

        if let Ok(token) = std::env::var(MATRIX_TOKEN_ENV) {
            config.apply_matrix_token(token);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a configuration given as a YAML string, without
    /// environment overrides.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_matrix_token(&mut self, token: String) {
        if let Some(matrix) = self.sinks.matrix.as_mut() {
            matrix.access_token = token;
        }
    }

    /// Checks the constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoints.is_empty() {
            return Err(ConfigError::Invalid("at least one endpoint is required".to_string()));
        }
        if self.sinks.is_empty() {
            return Err(ConfigError::Invalid("at least one sink must be enabled".to_string()));
        }
        if let Some(matrix) = &self.sinks.matrix {
            if matrix.access_token.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "matrix sink needs an access token (config or {MATRIX_TOKEN_ENV})"
                )));
            }
        }
        if let Some(email) = &self.sinks.email {
            if email.to.is_empty() {
                return Err(ConfigError::Invalid("email sink needs at least one recipient".to_string()));
            }
        }
        for (field, filter) in
            [("extrinsic_filter", &self.extrinsic_filter), ("event_filter", &self.event_filter)]
        {
            if let Some(name) = filter.invalid_name() {
                return Err(ConfigError::Invalid(format!(
                    "{field} entry '{name}' is not of the form section.method"
                )));
            }
        }
        if self.header_channel_capacity == 0 {
            return Err(ConfigError::Invalid("header_channel_capacity must be positive".to_string()));
        }
        if self.max_resubscribe_attempts == 0 {
            return Err(ConfigError::Invalid("max_resubscribe_attempts must be positive".to_string()));
        }
        Ok(())
    }

    /// The normalized interests shared by all endpoints.
    pub fn interests(&self) -> Interests {
        build_interests(&self.accounts, &self.extrinsic_filter, &self.event_filter)
    }

    /// Settings for the endpoint runners.
    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            resubscribe_delay: self.resubscribe_delay_ms,
            max_resubscribe_attempts: self.max_resubscribe_attempts,
            header_channel_capacity: self.header_channel_capacity,
        }
    }
}
