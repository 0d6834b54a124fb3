//! Runs one endpoint: keeps a finality subscription alive and feeds it
//! through the [`HeadTracker`] into a [`HeaderHandler`].

use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::head_tracker::{HeadTracker, HeaderHandler, TrackerExit};
use crate::{
    http_server::Readiness,
    models::Header,
    providers::traits::{DataSource, DataSourceError, HeaderStream},
};

/// Errors that end an endpoint runner.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The subscription could not be re-established.
    #[error("Lost connection to {chain} after {attempts} failed attempts: {last_error}")]
    ConnectionLost {
        /// The chain of the endpoint.
        chain: String,
        /// Consecutive failed attempts.
        attempts: u32,
        /// The error of the last attempt.
        last_error: String,
    },
}

/// Resubscription and buffering settings for a runner.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Wait time before resubscribing after the subscription ended.
    pub resubscribe_delay: Duration,
    /// Consecutive failed subscriptions tolerated before giving up.
    pub max_resubscribe_attempts: u32,
    /// Capacity of the channel between the subscription and the tracker.
    pub header_channel_capacity: usize,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            resubscribe_delay: Duration::from_secs(5),
            max_resubscribe_attempts: 10,
            header_channel_capacity: 64,
        }
    }
}

/// Asks the node behind `url` for its chain name, retrying like a failed
/// subscription.
///
/// Returns `Ok(None)` when cancelled before the node answered.
pub async fn identify<D: DataSource + ?Sized>(
    url: &Url,
    data_source: &D,
    settings: &RunnerSettings,
    cancel: &CancellationToken,
) -> Result<Option<String>, EndpointError> {
    let mut failures: u32 = 0;
    loop {
        let last_error = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Ok(None),
            result = data_source.chain_name() => match result {
                Ok(chain) => {
                    tracing::info!(%url, chain = %chain, "Endpoint identified.");
                    return Ok(Some(chain));
                }
                Err(e) => e.to_string(),
            },
        };

        failures += 1;
        if failures >= settings.max_resubscribe_attempts {
            tracing::error!(%url, attempts = failures, error = %last_error, "Giving up on endpoint.");
            return Err(EndpointError::ConnectionLost {
                chain: url.to_string(),
                attempts: failures,
                last_error,
            });
        }

        tracing::warn!(
            %url,
            error = %last_error,
            failures,
            delay = ?settings.resubscribe_delay,
            "Endpoint unreachable, retrying."
        );

        tokio::select! {
            biased;

            _ = cancel.cancelled() => return Ok(None),
            _ = tokio::time::sleep(settings.resubscribe_delay) => {}
        }
    }
}

/// Drives one endpoint until cancelled or until its connection is lost for
/// good.
pub struct EndpointRunner<D: DataSource + ?Sized, H: HeaderHandler + ?Sized> {
    chain: String,
    data_source: Arc<D>,
    handler: Arc<H>,
    settings: RunnerSettings,
    readiness: Option<Arc<Readiness>>,
}

impl<D, H> EndpointRunner<D, H>
where
    D: DataSource + ?Sized,
    H: HeaderHandler + ?Sized,
{
    /// Creates a new runner.
    pub fn new(
        chain: impl Into<String>,
        data_source: Arc<D>,
        handler: Arc<H>,
        settings: RunnerSettings,
    ) -> Self {
        Self { chain: chain.into(), data_source, handler, settings, readiness: None }
    }

    /// Reports the endpoint as ready once its first subscription is up.
    pub fn with_readiness(mut self, readiness: Arc<Readiness>) -> Self {
        self.readiness = Some(readiness);
        self
    }

    /// Runs the endpoint.
    ///
    /// The tracker, and with it the watermark, survives resubscriptions, so
    /// the blocks finalized during an outage are backfilled on the first
    /// notification after it.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), EndpointError> {
        let mut tracker = HeadTracker::new(self.chain.clone(), self.data_source.clone());
        let mut readiness = self.readiness.clone();
        let mut failures: u32 = 0;

        loop {
            let last_error = match self.data_source.subscribe_finalized_heads().await {
                Ok(stream) => {
                    tracing::info!(chain = %self.chain, "Subscribed to finalized heads.");
                    if let Some(readiness) = readiness.take() {
                        readiness.mark_ready();
                    }

                    let (tx, mut rx) = mpsc::channel(self.settings.header_channel_capacity);
                    let forwarder = tokio::spawn(forward(stream, tx));
                    let exit = tracker.run(&mut rx, &*self.handler, &cancel).await;

                    match exit {
                        TrackerExit::Cancelled => {
                            forwarder.abort();
                            return Ok(());
                        }
                        TrackerExit::ChannelClosed { received } => {
                            if received > 0 {
                                failures = 0;
                            } else {
                                failures += 1;
                            }
                            match forwarder.await {
                                Ok(error) => error.to_string(),
                                Err(e) => e.to_string(),
                            }
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    e.to_string()
                }
            };

            if failures >= self.settings.max_resubscribe_attempts {
                tracing::error!(chain = %self.chain, attempts = failures, error = %last_error, "Giving up on endpoint.");
                return Err(EndpointError::ConnectionLost {
                    chain: self.chain.clone(),
                    attempts: failures,
                    last_error,
                });
            }

            tracing::warn!(
                chain = %self.chain,
                error = %last_error,
                failures,
                delay = ?self.settings.resubscribe_delay,
                "Finality subscription ended, resubscribing."
            );

            tokio::select! {
                biased;

                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.settings.resubscribe_delay) => {}
            }
        }
    }
}

/// Pushes the headers of `stream` into the tracker's channel and returns why
/// the stream stopped.
async fn forward(mut stream: HeaderStream, tx: mpsc::Sender<Header>) -> DataSourceError {
    while let Some(next) = stream.next().await {
        match next {
            Ok(header) =>
                if tx.send(header).await.is_err() {
                    return DataSourceError::SubscriptionClosed("tracker stopped".to_string());
                },
            Err(e) => return e,
        }
    }
    DataSourceError::SubscriptionClosed("stream ended".to_string())
}
