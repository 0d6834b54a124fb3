use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::helpers::{deserialize_duration_from_ms, deserialize_duration_from_seconds};

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(250)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff_base() -> u32 {
    2
}

/// Whether retry delays are randomized.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JitterSetting {
    /// Fixed exponential delays.
    None,
    /// Delays drawn uniformly up to the exponential bound.
    #[default]
    Full,
}

/// Retry policy for outbound HTTP calls made by the sinks.
///
/// Only transient failures (connection errors, timeouts, 5xx and 429
/// answers) are retried.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct HttpRetryConfig {
    /// Maximum number of retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Growth factor between consecutive delays.
    #[serde(default = "default_backoff_base")]
    pub backoff_base: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_backoff", deserialize_with = "deserialize_duration_from_ms")]
    pub initial_backoff_ms: Duration,
    /// Upper bound for any delay, in seconds.
    #[serde(default = "default_max_backoff", deserialize_with = "deserialize_duration_from_seconds")]
    pub max_backoff_secs: Duration,
    /// Jitter applied to the delays.
    #[serde(default)]
    pub jitter: JitterSetting,
}

impl Default for HttpRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base: default_backoff_base(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
            jitter: JitterSetting::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_retry_config_uses_defaults() {
        let config: HttpRetryConfig =
            serde_json::from_str(r#"{"max_retries": 5, "jitter": "none"}"#).unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.jitter, JitterSetting::None);
        assert_eq!(config.initial_backoff_ms, Duration::from_millis(250));
        assert_eq!(config.max_backoff_secs, Duration::from_secs(10));
    }
}
