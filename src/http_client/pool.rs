//! A shared pool of retrying HTTP clients, one per retry policy.

use std::{collections::HashMap, sync::Arc, time::Duration};

use reqwest::Client as ReqwestClient;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;
use tokio::sync::RwLock;

use super::client::create_retryable_http_client;
use crate::config::HttpRetryConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Errors that can occur within the `HttpClientPool`.
#[derive(Debug, Error)]
pub enum HttpClientPoolError {
    /// An error occurred while building the underlying `reqwest::Client`.
    #[error("Failed to create HTTP client: {0}")]
    HttpClientBuildError(String),
}

/// Hands out HTTP clients keyed by retry policy.
///
/// Sinks that share a policy share a client, and with it the connection
/// pool.
#[derive(Default)]
pub struct HttpClientPool {
    clients: RwLock<HashMap<HttpRetryConfig, Arc<ClientWithMiddleware>>>,
}

impl HttpClientPool {
    /// Creates a new, empty `HttpClientPool`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the client for `retry_policy`, creating it on first use.
    pub async fn get_or_create(
        &self,
        retry_policy: &HttpRetryConfig,
    ) -> Result<Arc<ClientWithMiddleware>, HttpClientPoolError> {
        if let Some(client) = self.clients.read().await.get(retry_policy) {
            return Ok(client.clone());
        }

        let mut clients = self.clients.write().await;
        // Another task may have created it while we waited for the write lock.
        if let Some(client) = clients.get(retry_policy) {
            return Ok(client.clone());
        }

        let base_client = ReqwestClient::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .pool_idle_timeout(Some(IDLE_TIMEOUT))
            .build()
            .map_err(|e| HttpClientPoolError::HttpClientBuildError(e.to_string()))?;

        let client = Arc::new(create_retryable_http_client(retry_policy, base_client));
        clients.insert(retry_policy.clone(), client.clone());
        Ok(client)
    }

    /// Number of distinct clients created so far.
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Returns `true` when no client has been created yet.
    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}
