//! This module provides the `SupervisorBuilder` for constructing a `Supervisor`.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{Supervisor, SupervisorError};
use crate::{
    config::AppConfig,
    http_server::Readiness,
    providers::traits::DataSource,
    sinks::{ReportDispatcher, Sink},
};

/// An endpoint and the data source reading from it.
pub struct EndpointSource {
    /// The endpoint URL.
    pub url: Url,
    /// The data source reading from the endpoint.
    pub data_source: Arc<dyn DataSource>,
}

/// A builder for creating a `Supervisor` instance.
#[derive(Default)]
pub struct SupervisorBuilder {
    config: Option<AppConfig>,
    endpoints: Vec<(Url, Arc<dyn DataSource>)>,
    sinks: Vec<Arc<dyn Sink>>,
    cancellation_token: Option<CancellationToken>,
}

impl SupervisorBuilder {
    /// Creates a new, empty `SupervisorBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application configuration for the `Supervisor`.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Adds an endpoint and the data source connected to it.
    pub fn endpoint(mut self, url: Url, data_source: Arc<dyn DataSource>) -> Self {
        self.endpoints.push((url, data_source));
        self
    }

    /// Sets the sinks every report is dispatched to.
    pub fn sinks(mut self, sinks: Vec<Arc<dyn Sink>>) -> Self {
        self.sinks = sinks;
        self
    }

    /// Uses an external cancellation token instead of a fresh one.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Assembles and validates the components to build a `Supervisor`.
    ///
    /// No endpoint is contacted here; each one is identified by its own task
    /// once the supervisor runs.
    pub fn build(self) -> Result<Supervisor, SupervisorError> {
        let config = self.config.ok_or(SupervisorError::MissingConfig)?;
        if self.endpoints.is_empty() {
            return Err(SupervisorError::MissingEndpoints);
        }
        if self.sinks.is_empty() {
            return Err(SupervisorError::MissingSinks);
        }

        let endpoints: Vec<EndpointSource> = self
            .endpoints
            .into_iter()
            .map(|(url, data_source)| EndpointSource { url, data_source })
            .collect();

        let interests = config.interests();
        tracing::info!(
            accounts = interests.accounts.len(),
            extrinsic_methods = interests.extrinsic_methods.len(),
            event_methods = interests.event_methods.len(),
            sinks = self.sinks.len(),
            "Interests loaded."
        );

        Ok(Supervisor {
            readiness: Arc::new(Readiness::new(endpoints.len())),
            endpoints,
            interests: Arc::new(interests),
            dispatcher: Arc::new(ReportDispatcher::new(self.sinks)),
            runner_settings: config.runner_settings(),
            failure_policy: config.endpoint_failure_policy,
            server: config.server.clone(),
            shutdown_timeout: config.shutdown_timeout,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
            join_set: JoinSet::new(),
        })
    }
}
