//! Turns the raw finality notifications of one endpoint into a gap-free,
//! strictly ascending sequence of headers.
//!
//! A node may finalize several blocks at once and announce only the last one.
//! The tracker remembers the highest height it has delivered (its watermark)
//! and, when a notification skips ahead, fetches the missing headers by
//! height and delivers them first.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    models::Header,
    providers::traits::{DataSource, DataSourceError},
};

/// Errors surfaced by the tracker to its handler.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// A header missing from the notification stream could not be fetched.
    /// The remaining heights of that backfill pass are skipped.
    #[error("Failed to backfill header at height {height}: {source}")]
    Backfill {
        /// The height that could not be fetched.
        height: u64,
        /// The underlying data source error.
        #[source]
        source: DataSourceError,
    },
}

/// Receives the ordered headers produced by a [`HeadTracker`].
#[async_trait]
pub trait HeaderHandler: Send + Sync {
    /// Called once per height, in strictly ascending order. The tracker does
    /// not look at the next notification until this returns.
    async fn on_header(&self, header: Header);

    /// Called when the tracker hits an error it recovered from.
    async fn on_error(&self, error: TrackerError) {
        tracing::error!(error = %error, "Head tracker error.");
    }
}

/// Why [`HeadTracker::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerExit {
    /// The cancellation token fired.
    Cancelled,
    /// The sending side of the header channel went away.
    ChannelClosed {
        /// Number of notifications read from the channel before it closed.
        received: usize,
    },
}

/// The per-endpoint finality state machine.
pub struct HeadTracker<D: DataSource + ?Sized> {
    chain: String,
    data_source: Arc<D>,
    last_delivered: Option<u64>,
}

impl<D: DataSource + ?Sized> HeadTracker<D> {
    /// Creates a tracker with no watermark.
    pub fn new(chain: impl Into<String>, data_source: Arc<D>) -> Self {
        Self { chain: chain.into(), data_source, last_delivered: None }
    }

    /// The highest height delivered so far.
    pub fn last_delivered(&self) -> Option<u64> {
        self.last_delivered
    }

    /// Handles one finality notification.
    ///
    /// Notifications at or below the watermark are dropped. Otherwise every
    /// height between the watermark and `header` is fetched and handed to
    /// `handler` before `header` itself. If a backfill fetch fails, the rest
    /// of that pass is abandoned, `header` is still delivered and the error is
    /// returned; the watermark always ends up at `header.height`.
    pub async fn process<H>(&mut self, header: Header, handler: &H) -> Result<(), TrackerError>
    where
        H: HeaderHandler + ?Sized,
    {
        let mut backfill = Ok(());

        if let Some(last) = self.last_delivered {
            if header.height <= last {
                tracing::warn!(
                    chain = %self.chain,
                    height = header.height,
                    watermark = last,
                    "Dropping finality notification at or below the watermark."
                );
                return Ok(());
            }

            let missing = last + 1..header.height;
            if !missing.is_empty() {
                tracing::info!(
                    chain = %self.chain,
                    from = missing.start,
                    to = header.height - 1,
                    "Finality skipped heights, backfilling."
                );
            }

            for height in missing {
                match self.data_source.header_by_height(height).await {
                    Ok(missed) => {
                        tracing::debug!(chain = %self.chain, height, "Delivering backfilled header.");
                        handler.on_header(missed).await;
                        self.last_delivered = Some(height);
                    }
                    Err(source) => {
                        backfill = Err(TrackerError::Backfill { height, source });
                        break;
                    }
                }
            }
        }

        tracing::info!(chain = %self.chain, height = header.height, hash = %header.hash, "Finalized header.");
        let height = header.height;
        handler.on_header(header).await;
        self.last_delivered = Some(height);

        backfill
    }

    /// Consumes notifications from `headers` until the channel closes or
    /// `cancel` fires. Cancellation is only observed between notifications,
    /// so a block that is being handled always finishes.
    pub async fn run<H>(
        &mut self,
        headers: &mut mpsc::Receiver<Header>,
        handler: &H,
        cancel: &CancellationToken,
    ) -> TrackerExit
    where
        H: HeaderHandler + ?Sized,
    {
        let mut received = 0;
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::info!(chain = %self.chain, "Head tracker cancelled.");
                    return TrackerExit::Cancelled;
                }

                next = headers.recv() => match next {
                    Some(header) => {
                        received += 1;
                        if let Err(e) = self.process(header, handler).await {
                            handler.on_error(e).await;
                        }
                    }
                    None => return TrackerExit::ChannelClosed { received },
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use mockall::predicate::eq;

    use super::*;
    use crate::{models::BlockHash, providers::traits::MockDataSource};

    fn header(height: u64) -> Header {
        Header::new(height, BlockHash([height as u8; 32]))
    }

    #[derive(Default)]
    struct Recorder {
        heights: Mutex<Vec<u64>>,
        errors: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn heights(&self) -> Vec<u64> {
            self.heights.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HeaderHandler for Recorder {
        async fn on_header(&self, header: Header) {
            self.heights.lock().unwrap().push(header.height);
        }

        async fn on_error(&self, error: TrackerError) {
            self.errors.lock().unwrap().push(error.to_string());
        }
    }

    fn tracker_at(watermark: u64, data_source: MockDataSource) -> HeadTracker<MockDataSource> {
        let mut tracker = HeadTracker::new("Polkadot", Arc::new(data_source));
        tracker.last_delivered = Some(watermark);
        tracker
    }

    #[tokio::test]
    async fn test_first_header_is_delivered_without_backfill() {
        let mut data_source = MockDataSource::new();
        data_source.expect_header_by_height().never();
        let mut tracker = HeadTracker::new("Polkadot", Arc::new(data_source));
        let recorder = Recorder::default();

        tracker.process(header(100), &recorder).await.unwrap();

        assert_eq!(recorder.heights(), vec![100]);
        assert_eq!(tracker.last_delivered(), Some(100));
    }

    #[tokio::test]
    async fn test_gap_is_backfilled_in_ascending_order() {
        let mut data_source = MockDataSource::new();
        for height in 11..=13 {
            data_source
                .expect_header_by_height()
                .with(eq(height))
                .times(1)
                .returning(|h| Ok(header(h)));
        }
        let mut tracker = tracker_at(10, data_source);
        let recorder = Recorder::default();

        tracker.process(header(14), &recorder).await.unwrap();

        assert_eq!(recorder.heights(), vec![11, 12, 13, 14]);
        assert_eq!(tracker.last_delivered(), Some(14));
    }

    #[tokio::test]
    async fn test_next_height_needs_no_fetch() {
        let mut data_source = MockDataSource::new();
        data_source.expect_header_by_height().never();
        let mut tracker = tracker_at(10, data_source);
        let recorder = Recorder::default();

        tracker.process(header(11), &recorder).await.unwrap();

        assert_eq!(recorder.heights(), vec![11]);
    }

    #[tokio::test]
    async fn test_stale_and_duplicate_notifications_are_dropped() {
        let mut data_source = MockDataSource::new();
        data_source.expect_header_by_height().never();
        let mut tracker = tracker_at(10, data_source);
        let recorder = Recorder::default();

        tracker.process(header(10), &recorder).await.unwrap();
        tracker.process(header(7), &recorder).await.unwrap();

        assert!(recorder.heights().is_empty());
        assert_eq!(tracker.last_delivered(), Some(10));
    }

    #[tokio::test]
    async fn test_backfill_failure_skips_rest_of_pass_but_delivers_announced_header() {
        let mut data_source = MockDataSource::new();
        data_source.expect_header_by_height().with(eq(11)).times(1).returning(|h| Ok(header(h)));
        data_source
            .expect_header_by_height()
            .with(eq(12))
            .times(1)
            .returning(|h| Err(DataSourceError::BlockNotFound(h)));
        let mut tracker = tracker_at(10, data_source);
        let recorder = Recorder::default();

        let result = tracker.process(header(14), &recorder).await;

        assert!(matches!(result, Err(TrackerError::Backfill { height: 12, .. })));
        assert_eq!(recorder.heights(), vec![11, 14]);
        assert_eq!(tracker.last_delivered(), Some(14));
    }

    #[tokio::test]
    async fn test_run_reports_errors_and_stops_when_channel_closes() {
        let mut data_source = MockDataSource::new();
        data_source
            .expect_header_by_height()
            .with(eq(2))
            .times(1)
            .returning(|h| Err(DataSourceError::BlockNotFound(h)));
        let mut tracker = HeadTracker::new("Kusama", Arc::new(data_source));
        let recorder = Recorder::default();
        let (tx, mut rx) = mpsc::channel(8);
        for height in [1, 3, 4] {
            tx.send(header(height)).await.unwrap();
        }
        drop(tx);

        let exit = tracker.run(&mut rx, &recorder, &CancellationToken::new()).await;

        assert_eq!(exit, TrackerExit::ChannelClosed { received: 3 });
        assert_eq!(recorder.heights(), vec![1, 3, 4]);
        assert_eq!(recorder.errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancellation() {
        let mut tracker = HeadTracker::new("Kusama", Arc::new(MockDataSource::new()));
        let recorder = Recorder::default();
        let (_tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let exit = tracker.run(&mut rx, &recorder, &cancel).await;

        assert_eq!(exit, TrackerExit::Cancelled);
        assert!(recorder.heights().is_empty());
    }
}
