//! HTTP server module

mod status;

use std::{net::SocketAddr, sync::Arc};

use axum::{Router, routing::get};
pub use status::Readiness;
use tokio_util::sync::CancellationToken;

/// Builds the router serving `/health`.
pub fn router(readiness: Arc<Readiness>) -> Router {
    Router::new().route("/health", get(status::health)).with_state(readiness)
}

/// Serves the health probe on `addr` until `cancel` fires.
pub async fn run_server(
    addr: SocketAddr,
    readiness: Arc<Readiness>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Health server listening.");
    axum::serve(listener, router(readiness).into_make_service())
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}
