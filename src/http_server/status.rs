//! Readiness tracking behind the `/health` endpoint.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use axum::{extract::State, http::StatusCode, response::IntoResponse};

/// Counts endpoints that have established their first subscription.
#[derive(Debug)]
pub struct Readiness {
    expected: usize,
    ready: AtomicUsize,
}

impl Readiness {
    /// Creates a tracker waiting for `expected` endpoints.
    pub fn new(expected: usize) -> Self {
        Self { expected, ready: AtomicUsize::new(0) }
    }

    /// Records one more ready endpoint. Each endpoint calls this once.
    pub fn mark_ready(&self) {
        self.ready.fetch_add(1, Ordering::SeqCst);
    }

    /// Returns `true` once every endpoint is ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst) >= self.expected
    }
}

/// `GET /health`: 200 once every endpoint is subscribed, 503 before.
pub async fn health(State(readiness): State<Arc<Readiness>>) -> impl IntoResponse {
    if readiness.is_ready() {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_after_all_endpoints() {
        let readiness = Readiness::new(2);
        assert!(!readiness.is_ready());
        readiness.mark_ready();
        assert!(!readiness.is_ready());
        readiness.mark_ready();
        assert!(readiness.is_ready());
    }

    #[tokio::test]
    async fn test_health_status_codes() {
        let readiness = Arc::new(Readiness::new(1));

        let response = health(State(readiness.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        readiness.mark_ready();
        let response = health(State(readiness)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
