use std::time::Duration;

use serde::{Deserialize, Deserializer, de};
use url::Url;

/// Deserializes a `Duration` given in milliseconds.
pub fn deserialize_duration_from_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let ms = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(ms))
}

/// Deserializes a `Duration` given in seconds.
pub fn deserialize_duration_from_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

/// Deserializes a list of WebSocket endpoint URLs, rejecting anything that is
/// not `ws://` or `wss://`.
pub fn deserialize_ws_urls<'de, D>(deserializer: D) -> Result<Vec<Url>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|s| {
            let url = Url::parse(&s).map_err(de::Error::custom)?;
            match url.scheme() {
                "ws" | "wss" => Ok(url),
                other => Err(de::Error::custom(format!(
                    "endpoint '{s}' has scheme '{other}', expected ws or wss"
                ))),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Durations {
        #[serde(deserialize_with = "deserialize_duration_from_ms")]
        delay: Duration,
        #[serde(deserialize_with = "deserialize_duration_from_seconds")]
        timeout: Duration,
    }

    #[derive(Debug, Deserialize)]
    struct Endpoints {
        #[serde(deserialize_with = "deserialize_ws_urls")]
        endpoints: Vec<Url>,
    }

    #[test]
    fn test_deserialize_durations() {
        let parsed: Durations = serde_json::from_str(r#"{"delay": 1500, "timeout": 5}"#).unwrap();
        assert_eq!(
            parsed,
            Durations { delay: Duration::from_millis(1500), timeout: Duration::from_secs(5) }
        );
    }

    #[test]
    fn test_deserialize_ws_urls() {
        let parsed: Endpoints =
            serde_json::from_str(r#"{"endpoints": ["wss://rpc.polkadot.io", "ws://localhost:9944"]}"#)
                .unwrap();
        assert_eq!(parsed.endpoints.len(), 2);
        assert_eq!(parsed.endpoints[1].port(), Some(9944));
    }

    #[test]
    fn test_deserialize_ws_urls_rejects_http_and_garbage() {
        assert!(serde_json::from_str::<Endpoints>(r#"{"endpoints": ["https://rpc.polkadot.io"]}"#).is_err());
        assert!(serde_json::from_str::<Endpoints>(r#"{"endpoints": ["not a url"]}"#).is_err());
    }
}
