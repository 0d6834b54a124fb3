//! Posts reports into a Matrix room through the client-server API.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use reqwest_middleware::ClientWithMiddleware;
use serde_json::json;
use url::Url;

use super::{Sink, SinkError, template::TemplateService};
use crate::{config::MatrixConfig, models::Report};

/// A sink that sends each report as an HTML `m.room.message`.
pub struct MatrixSink {
    server: Url,
    room_id: String,
    access_token: String,
    http_client: Arc<ClientWithMiddleware>,
    template_service: Arc<TemplateService>,
    txn_counter: AtomicU64,
}

impl MatrixSink {
    /// Creates a new `MatrixSink`.
    pub fn new(
        config: &MatrixConfig,
        http_client: Arc<ClientWithMiddleware>,
        template_service: Arc<TemplateService>,
    ) -> Self {
        Self {
            server: with_trailing_slash(&config.server),
            room_id: config.room_id.clone(),
            access_token: config.access_token.clone(),
            http_client,
            template_service,
            txn_counter: AtomicU64::new(0),
        }
    }

    /// Builds the send-event URL for a transaction id.
    fn send_url(&self, txn_id: &str) -> Result<Url, SinkError> {
        let path = format!(
            "_matrix/client/v3/rooms/{}/send/m.room.message/{}",
            urlencoding::encode(&self.room_id),
            txn_id
        );
        self.server.join(&path).map_err(|e| SinkError::Config(e.to_string()))
    }

    /// Transaction ids must be unique per access token; the server uses them
    /// to deduplicate retried requests.
    fn next_txn_id(&self) -> String {
        let millis = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
        let seq = self.txn_counter.fetch_add(1, Ordering::Relaxed);
        format!("sentinel-{millis}-{seq}")
    }
}

/// `Url::join` replaces the last path segment unless the base ends with `/`.
fn with_trailing_slash(server: &Url) -> Url {
    let mut server = server.clone();
    if !server.path().ends_with('/') {
        let path = format!("{}/", server.path());
        server.set_path(&path);
    }
    server
}

#[async_trait::async_trait]
impl Sink for MatrixSink {
    fn name(&self) -> &str {
        "matrix"
    }

    async fn deliver(&self, report: &Report) -> Result<(), SinkError> {
        let html = self.template_service.render_html(report)?;
        let body = json!({
            "msgtype": "m.text",
            "format": "org.matrix.custom.html",
            "body": html,
            "formatted_body": html,
        });

        let url = self.send_url(&self.next_txn_id())?;
        let response = self
            .http_client
            .put(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected { status: status.as_u16(), body });
        }

        tracing::debug!(room = %self.room_id, height = report.height(), "Report posted to Matrix.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::HttpRetryConfig, http_client::HttpClientPool};

    async fn sink(server: &str) -> MatrixSink {
        let config = MatrixConfig {
            server: Url::parse(server).unwrap(),
            room_id: "!room:example.org".to_string(),
            access_token: "secret".to_string(),
            retry_policy: HttpRetryConfig::default(),
        };
        let client = HttpClientPool::new().get_or_create(&config.retry_policy).await.unwrap();
        MatrixSink::new(&config, client, Arc::new(TemplateService::new()))
    }

    #[tokio::test]
    async fn test_send_url_encodes_room_id() {
        let sink = sink("https://matrix.example.org").await;

        let url = sink.send_url("txn-1").unwrap();

        assert_eq!(
            url.as_str(),
            "https://matrix.example.org/_matrix/client/v3/rooms/%21room%3Aexample.org/send/m.room.message/txn-1"
        );
    }

    #[tokio::test]
    async fn test_send_url_keeps_homeserver_path() {
        for server in ["https://example.org/matrix", "https://example.org/matrix/"] {
            let sink = sink(server).await;

            let url = sink.send_url("txn-2").unwrap();

            assert_eq!(
                url.as_str(),
                "https://example.org/matrix/_matrix/client/v3/rooms/%21room%3Aexample.org/send/m.room.message/txn-2"
            );
        }
    }

    #[tokio::test]
    async fn test_transaction_ids_are_unique() {
        let sink = sink("https://matrix.example.org").await;
        assert_ne!(sink.next_txn_id(), sink.next_txn_id());
    }
}
