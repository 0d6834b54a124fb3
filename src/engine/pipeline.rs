//! The per-block work of one endpoint: fetch, filter, assemble, dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use super::{
    assembler::assemble,
    filtering::{filter_events, filter_extrinsics},
    head_tracker::HeaderHandler,
};
use crate::{
    models::{BlockSnapshot, Header, Interests, Report},
    providers::traits::DataSource,
    sinks::ReportDispatcher,
};

/// Everything one endpoint's pipeline knows about itself.
///
/// Each endpoint owns its own context; the only shared part is the read-only
/// set of interests.
#[derive(Debug, Clone)]
pub struct EndpointContext {
    /// Chain name as reported by the node.
    pub chain: String,
    /// The endpoint the chain is read from.
    pub url: Url,
    /// What to look for in each block.
    pub interests: Arc<Interests>,
}

/// Handles the ordered headers of one endpoint.
pub struct BlockPipeline<D: DataSource + ?Sized> {
    context: EndpointContext,
    data_source: Arc<D>,
    dispatcher: Arc<ReportDispatcher>,
}

impl<D: DataSource + ?Sized> BlockPipeline<D> {
    /// Creates a new pipeline.
    pub fn new(
        context: EndpointContext,
        data_source: Arc<D>,
        dispatcher: Arc<ReportDispatcher>,
    ) -> Self {
        Self { context, data_source, dispatcher }
    }

    /// The endpoint context.
    pub fn context(&self) -> &EndpointContext {
        &self.context
    }

    /// Filters a snapshot against the endpoint's interests and assembles the
    /// result.
    pub fn process_snapshot(&self, snapshot: &BlockSnapshot) -> Option<Report> {
        let interests = &self.context.interests;
        let extrinsics =
            filter_extrinsics(snapshot, &interests.accounts, &interests.extrinsic_methods);
        let events = filter_events(snapshot, &interests.event_methods);
        assemble(snapshot, extrinsics, events)
    }
}

#[async_trait]
impl<D: DataSource + ?Sized> HeaderHandler for BlockPipeline<D> {
    async fn on_header(&self, header: Header) {
        let chain = &self.context.chain;
        let snapshot = match self.data_source.fetch_snapshot(&header).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(chain = %chain, height = header.height, error = %e, "Failed to fetch block, skipping.");
                return;
            }
        };

        let Some(report) = self.process_snapshot(&snapshot) else {
            tracing::debug!(chain = %chain, height = header.height, "No matches in block.");
            return;
        };

        tracing::info!(chain = %chain, height = header.height, items = report.items().len(), "Dispatching report.");
        let summary = self.dispatcher.dispatch(&report).await;
        if summary.failed > 0 {
            tracing::warn!(
                chain = %chain,
                height = header.height,
                delivered = summary.delivered,
                failed = summary.failed,
                "Report was not delivered to every sink."
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{AccountEntry, AccountFilter, BlockHash, MethodFilter},
        providers::traits::{DataSourceError, MockDataSource},
        sinks::Sink,
        test_helpers::{EventBuilder, ExtrinsicBuilder, RecordingSink, SnapshotBuilder},
    };

    const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";

    fn context(interests: Interests) -> EndpointContext {
        EndpointContext {
            chain: "Polkadot".to_string(),
            url: Url::parse("wss://rpc.polkadot.io").unwrap(),
            interests: Arc::new(interests),
        }
    }

    fn pipeline(
        data_source: MockDataSource,
        interests: Interests,
    ) -> (BlockPipeline<MockDataSource>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new("recording"));
        let dispatcher = Arc::new(ReportDispatcher::new(vec![sink.clone() as Arc<dyn Sink>]));
        (BlockPipeline::new(context(interests), Arc::new(data_source), dispatcher), sink)
    }

    #[tokio::test]
    async fn test_matching_block_is_dispatched() {
        let mut data_source = MockDataSource::new();
        data_source.expect_fetch_snapshot().times(1).returning(|header| {
            Ok(SnapshotBuilder::new()
                .height(header.height)
                .extrinsic(ExtrinsicBuilder::new(1).signer(ALICE).build())
                .build())
        });
        let interests = Interests {
            accounts: AccountFilter::new([AccountEntry::new(ALICE, "treasury")]),
            ..Default::default()
        };
        let (pipeline, sink) = pipeline(data_source, interests);

        pipeline.on_header(Header::new(7, BlockHash::default())).await;

        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].height(), 7);
    }

    #[tokio::test]
    async fn test_quiet_block_is_not_dispatched() {
        let mut data_source = MockDataSource::new();
        data_source.expect_fetch_snapshot().times(1).returning(|_| {
            Ok(SnapshotBuilder::new().event(EventBuilder::new("system", "ExtrinsicSuccess").build()).build())
        });
        let interests = Interests {
            event_methods: ["balances.Transfer"].into_iter().collect::<MethodFilter>(),
            ..Default::default()
        };
        let (pipeline, sink) = pipeline(data_source, interests);

        pipeline.on_header(Header::new(8, BlockHash::default())).await;

        assert!(sink.reports().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_failure_skips_height() {
        let mut data_source = MockDataSource::new();
        data_source
            .expect_fetch_snapshot()
            .times(1)
            .returning(|header| Err(DataSourceError::BlockNotFound(header.height)));
        let (pipeline, sink) = pipeline(data_source, Interests::default());

        pipeline.on_header(Header::new(9, BlockHash::default())).await;

        assert!(sink.reports().is_empty());
    }
}
