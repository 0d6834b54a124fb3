//! # Sinks
//!
//! A sink is an external notification target. Every sink receives the same
//! [`Report`] and renders it into its own wire format:
//!
//! - **`ConsoleSink`**: JSON lines on standard output.
//! - **`MatrixSink`**: an HTML message in a Matrix room.
//! - **`EmailSink`**: an HTML email to each configured recipient.
//!
//! The [`ReportDispatcher`] drives all configured sinks for a report
//! concurrently, keeping their failures apart.

use std::sync::Arc;

use thiserror::Error;

use crate::{config::SinksConfig, http_client::HttpClientPool, models::Report};

mod console;
mod dispatcher;
mod email;
mod matrix;
pub mod template;

pub use console::{ConsoleSink, report_lines};
pub use dispatcher::{DispatchSummary, ReportDispatcher};
pub use email::{EmailSink, subject};
pub use matrix::MatrixSink;
use template::{TemplateService, TemplateServiceError};

/// Errors a sink can report for one delivery.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The report could not be rendered.
    #[error("Failed to render report: {0}")]
    Render(#[from] TemplateServiceError),

    /// The HTTP request failed after retries.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest_middleware::Error),

    /// The remote server answered with a non-success status.
    #[error("Request rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        body: String,
    },

    /// The email could not be built.
    #[error("Failed to build email: {0}")]
    Email(String),

    /// The mail transport refused one or more messages.
    #[error("Failed to send email: {0}")]
    Transport(String),

    /// Writing to a local stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The sink panicked while delivering.
    #[error("Sink panicked: {0}")]
    Panicked(String),

    /// The sink is misconfigured.
    #[error("Invalid sink configuration: {0}")]
    Config(String),
}

/// A notification target.
#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Delivers one report.
    async fn deliver(&self, report: &Report) -> Result<(), SinkError>;

    /// Releases the sink's resources.
    async fn shutdown(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Builds every sink enabled in `config`.
pub async fn build_sinks(
    config: &SinksConfig,
    client_pool: &HttpClientPool,
) -> Result<Vec<Arc<dyn Sink>>, SinkError> {
    let template_service = Arc::new(TemplateService::new());
    let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();

    if config.console {
        tracing::info!("Registering console sink.");
        sinks.push(Arc::new(ConsoleSink::stdout()));
    }

    if let Some(matrix) = &config.matrix {
        tracing::info!(server = %matrix.server, room = %matrix.room_id, "Registering Matrix sink.");
        let http_client = client_pool
            .get_or_create(&matrix.retry_policy)
            .await
            .map_err(|e| SinkError::Config(e.to_string()))?;
        sinks.push(Arc::new(MatrixSink::new(matrix, http_client, template_service.clone())));
    }

    if let Some(email) = &config.email {
        tracing::info!(relay = %email.smtp.host, recipients = email.to.len(), "Registering email sink.");
        sinks.push(Arc::new(EmailSink::from_config(email, template_service.clone())?));
    }

    Ok(sinks)
}
