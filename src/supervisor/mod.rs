//! The Supervisor manages the lifecycle of the sentinel.
//!
//! It owns one runner per endpoint, the signal handler and the health server,
//! all tied to a single cancellation token.
//!
//! - **Isolation**: endpoints never share mutable state. When one fails for
//!   good, the configured [`EndpointFailurePolicy`] decides whether the others
//!   keep running or the whole process stops.
//! - **Graceful shutdown**: on SIGINT/SIGTERM the runners finish the block in
//!   hand, then every sink is shut down, all bounded by the shutdown timeout.

mod builder;

use std::{sync::Arc, time::Duration};

pub use builder::{EndpointSource, SupervisorBuilder};
use thiserror::Error;
use tokio::{signal, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{EndpointFailurePolicy, ServerConfig},
    engine::{
        endpoint::{EndpointError, EndpointRunner, RunnerSettings, identify},
        pipeline::{BlockPipeline, EndpointContext},
    },
    http_server::{self, Readiness},
    models::Interests,
    sinks::ReportDispatcher,
};

/// Represents the set of errors that can occur during the supervisor's
/// operation.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A required configuration was not provided to the `SupervisorBuilder`.
    #[error("Missing configuration for Supervisor")]
    MissingConfig,

    /// No endpoint was provided to the `SupervisorBuilder`.
    #[error("Missing endpoints for Supervisor")]
    MissingEndpoints,

    /// No sink was provided to the `SupervisorBuilder`.
    #[error("Missing sinks for Supervisor")]
    MissingSinks,

    /// An endpoint was given up and the policy says to stop.
    #[error("Endpoint failed: {0}")]
    EndpointFailed(#[from] EndpointError),

    /// Every endpoint was given up.
    #[error("All endpoints have failed")]
    AllEndpointsFailed,

    /// A supervised task panicked.
    #[error("A supervised task panicked: {0}")]
    TaskPanicked(String),
}

/// What a supervised task reports when it finishes.
enum TaskExit {
    Endpoint { url: String, result: Result<(), EndpointError> },
    Service,
}

/// What one endpoint task shares with the rest of the supervisor.
struct EndpointTask {
    interests: Arc<Interests>,
    dispatcher: Arc<ReportDispatcher>,
    settings: RunnerSettings,
    readiness: Arc<Readiness>,
}

impl EndpointTask {
    /// Identifies the endpoint's chain, then runs its pipeline. An endpoint
    /// that cannot be reached only fails its own task.
    async fn run(
        self,
        endpoint: EndpointSource,
        cancel: CancellationToken,
    ) -> Result<(), EndpointError> {
        let Some(chain) =
            identify(&endpoint.url, &*endpoint.data_source, &self.settings, &cancel).await?
        else {
            return Ok(());
        };

        let context = EndpointContext {
            chain: chain.clone(),
            url: endpoint.url,
            interests: self.interests,
        };
        let pipeline =
            Arc::new(BlockPipeline::new(context, endpoint.data_source.clone(), self.dispatcher));
        EndpointRunner::new(chain, endpoint.data_source, pipeline, self.settings)
            .with_readiness(self.readiness)
            .run(cancel)
            .await
    }
}

/// The primary runtime manager for the application.
pub struct Supervisor {
    endpoints: Vec<EndpointSource>,
    interests: Arc<Interests>,
    dispatcher: Arc<ReportDispatcher>,
    runner_settings: RunnerSettings,
    failure_policy: EndpointFailurePolicy,
    server: ServerConfig,
    shutdown_timeout: Duration,
    readiness: Arc<Readiness>,
    cancellation_token: CancellationToken,
    join_set: JoinSet<TaskExit>,
}

impl Supervisor {
    /// Returns a new `SupervisorBuilder` instance.
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    /// The token that stops the supervisor when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// The readiness state served by the health endpoint.
    pub fn readiness(&self) -> Arc<Readiness> {
        self.readiness.clone()
    }

    /// Starts every service and runs until shutdown.
    ///
    /// Returns an error when an endpoint failure is escalated by the policy,
    /// when every endpoint has failed, or when a task panicked.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        self.spawn_signal_handler();

        if self.server.enabled {
            let readiness = self.readiness.clone();
            let cancel = self.cancellation_token.clone();
            let addr = self.server.listen_address;
            self.join_set.spawn(async move {
                if let Err(e) = http_server::run_server(addr, readiness, cancel).await {
                    tracing::error!(error = %e, "Health server failed.");
                }
                TaskExit::Service
            });
        }

        let mut active_endpoints = 0;
        for endpoint in std::mem::take(&mut self.endpoints) {
            tracing::info!(url = %endpoint.url, "Starting endpoint.");
            let task = EndpointTask {
                interests: self.interests.clone(),
                dispatcher: self.dispatcher.clone(),
                settings: self.runner_settings.clone(),
                readiness: self.readiness.clone(),
            };
            let cancel = self.cancellation_token.clone();
            let url = endpoint.url.to_string();
            self.join_set.spawn(async move {
                let result = task.run(endpoint, cancel).await;
                TaskExit::Endpoint { url, result }
            });
            active_endpoints += 1;
        }

        let mut fatal = None;
        loop {
            tokio::select! {
                maybe_result = self.join_set.join_next() => match maybe_result {
                    Some(Ok(TaskExit::Endpoint { url, result })) => {
                        active_endpoints -= 1;
                        if let Err(e) = result {
                            tracing::error!(url = %url, error = %e, "Endpoint stopped.");
                            if self.failure_policy == EndpointFailurePolicy::Exit {
                                fatal = Some(SupervisorError::EndpointFailed(e));
                                break;
                            }
                        }
                        if active_endpoints == 0 && !self.cancellation_token.is_cancelled() {
                            fatal = Some(SupervisorError::AllEndpointsFailed);
                            break;
                        }
                    }
                    Some(Ok(TaskExit::Service)) => {}
                    Some(Err(e)) => {
                        tracing::error!("A critical task failed: {:?}. Initiating shutdown.", e);
                        fatal = Some(SupervisorError::TaskPanicked(e.to_string()));
                        break;
                    }
                    None => break,
                },
                _ = self.cancellation_token.cancelled() => break,
            }
        }

        self.shutdown().await;
        fatal.map_or(Ok(()), Err)
    }

    fn spawn_signal_handler(&mut self) {
        let cancellation_token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            let ctrl_c = signal::ctrl_c();
            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to register SIGTERM handler.");
                        std::future::pending::<()>().await;
                    }
                }
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::info!("SIGINT (Ctrl+C) received, initiating graceful shutdown."),
                _ = terminate => tracing::info!("SIGTERM received, initiating graceful shutdown."),
                _ = cancellation_token.cancelled() => return TaskExit::Service,
            }

            cancellation_token.cancel();
            TaskExit::Service
        });
    }

    async fn shutdown(mut self) {
        self.cancellation_token.cancel();
        let shutdown_timeout = self.shutdown_timeout;

        let drain = async {
            while self.join_set.join_next().await.is_some() {}
        };
        if tokio::time::timeout(shutdown_timeout, drain).await.is_err() {
            tracing::warn!(
                "Tasks did not finish within the timeout of {:?}. Aborting them.",
                shutdown_timeout
            );
            self.join_set.shutdown().await;
        }
        tracing::info!("All supervised tasks have completed.");

        if tokio::time::timeout(shutdown_timeout, self.dispatcher.shutdown()).await.is_err() {
            tracing::warn!("Sinks did not shut down within the timeout of {:?}.", shutdown_timeout);
        }
        tracing::info!("Supervisor shutdown complete.");
    }
}
