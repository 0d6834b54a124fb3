//! Integration tests for one endpoint: subscription, tracking, backfill and
//! dispatch, driven by a scripted data source.

use std::{sync::Arc, time::Duration};

use chain_sentinel::{
    engine::{
        endpoint::{EndpointError, EndpointRunner, RunnerSettings},
        pipeline::{BlockPipeline, EndpointContext},
    },
    models::{AccountEntry, AccountFilter, Interests, MethodFilter, ReportItem},
    sinks::{ReportDispatcher, Sink},
    test_helpers::{
        EventBuilder, ExtrinsicBuilder, RecordingSink, ScriptedDataSource, SnapshotBuilder,
    },
};
use tokio_util::sync::CancellationToken;
use url::Url;

const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
const BOB: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";

fn settings() -> RunnerSettings {
    RunnerSettings {
        resubscribe_delay: Duration::from_millis(100),
        max_resubscribe_attempts: 1,
        header_channel_capacity: 4,
    }
}

/// Runs the endpoint until its scripted subscriptions are exhausted and
/// returns what the sink received.
async fn run_endpoint(
    data_source: Arc<ScriptedDataSource>,
    interests: Interests,
) -> (Result<(), EndpointError>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new("recording"));
    let dispatcher = Arc::new(ReportDispatcher::new(vec![sink.clone() as Arc<dyn Sink>]));
    let context = EndpointContext {
        chain: "Polkadot".to_string(),
        url: Url::parse("wss://rpc.polkadot.io").unwrap(),
        interests: Arc::new(interests),
    };
    let pipeline = Arc::new(BlockPipeline::new(context, data_source.clone(), dispatcher));
    let runner = EndpointRunner::new("Polkadot", data_source, pipeline, settings());

    let result = runner.run(CancellationToken::new()).await;
    (result, sink)
}

/// Every block carries one event, so every delivered height yields a report.
fn busy_chain(heights: std::ops::RangeInclusive<u64>) -> ScriptedDataSource {
    heights.fold(ScriptedDataSource::new("Polkadot"), |source, height| {
        source.snapshot(
            SnapshotBuilder::new()
                .height(height)
                .event(EventBuilder::new("balances", "Transfer").build())
                .build(),
        )
    })
}

#[tokio::test(start_paused = true)]
async fn test_finality_skip_is_backfilled_in_order() {
    let data_source = Arc::new(busy_chain(10..=14).subscription(&[10, 14]));

    let (result, sink) = run_endpoint(data_source.clone(), Interests::default()).await;

    assert!(matches!(result, Err(EndpointError::ConnectionLost { .. })));
    assert_eq!(sink.heights(), vec![10, 11, 12, 13, 14]);
    assert_eq!(data_source.header_requests(), vec![11, 12, 13]);
    assert_eq!(data_source.snapshot_requests(), vec![10, 11, 12, 13, 14]);
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_heights_need_no_backfill() {
    let data_source = Arc::new(busy_chain(10..=11).subscription(&[10, 11]));

    let (_, sink) = run_endpoint(data_source.clone(), Interests::default()).await;

    assert_eq!(sink.heights(), vec![10, 11]);
    assert!(data_source.header_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_outage_is_bridged_after_resubscription() {
    let data_source = Arc::new(busy_chain(5..=9).subscription(&[5, 6]).subscription(&[6, 9]));

    let (_, sink) = run_endpoint(data_source.clone(), Interests::default()).await;

    assert_eq!(sink.heights(), vec![5, 6, 7, 8, 9]);
    assert_eq!(data_source.header_requests(), vec![7, 8]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_backfill_skips_rest_of_gap() {
    let data_source = Arc::new(busy_chain(1..=5).missing(3).subscription(&[1, 5]));

    let (_, sink) = run_endpoint(data_source.clone(), Interests::default()).await;

    assert_eq!(sink.heights(), vec![1, 2, 5]);
    assert_eq!(data_source.header_requests(), vec![2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_quiet_blocks_produce_no_reports() {
    let data_source = Arc::new(
        ScriptedDataSource::new("Polkadot")
            .snapshot(
                SnapshotBuilder::new()
                    .height(2)
                    .extrinsic(ExtrinsicBuilder::new(1).signer(ALICE).call("balances", "transfer").build())
                    .build(),
            )
            .subscription(&[1, 3]),
    );

    let (_, sink) = run_endpoint(data_source, Interests::default()).await;

    assert_eq!(sink.heights(), vec![2]);
}

#[tokio::test(start_paused = true)]
async fn test_reports_carry_only_matching_items() {
    let snapshot = SnapshotBuilder::new()
        .height(7)
        .extrinsic(ExtrinsicBuilder::new(0).call("timestamp", "set").payload(r#"{"now":1}"#).build())
        .extrinsic(ExtrinsicBuilder::new(1).signer(ALICE).call("balances", "transferKeepAlive").build())
        .extrinsic(
            ExtrinsicBuilder::new(2)
                .signer(BOB)
                .call("balances", "transferKeepAlive")
                .payload(format!(r#"{{"dest":"{ALICE}","value":5}}"#))
                .build(),
        )
        .extrinsic(ExtrinsicBuilder::new(3).signer(BOB).call("staking", "bond").build())
        .event(EventBuilder::new("system", "ExtrinsicSuccess").build())
        .event(EventBuilder::new("balances", "Transfer").build())
        .build();
    let data_source = Arc::new(ScriptedDataSource::new("Polkadot").snapshot(snapshot).subscription(&[7]));
    let interests = Interests {
        accounts: AccountFilter::new([AccountEntry::new(ALICE, "alice")]),
        extrinsic_methods: MethodFilter::all(),
        event_methods: ["balances.Transfer"].into_iter().collect(),
    };

    let (_, sink) = run_endpoint(data_source, interests).await;

    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    let items = reports[0].items();
    assert_eq!(items.len(), 3);
    assert!(matches!(&items[0], ReportItem::Extrinsic { index: 1, account, .. } if account.label() == "alice"));
    assert!(matches!(&items[1], ReportItem::Extrinsic { index: 2, .. }));
    assert_eq!(items[2].method(), "Transfer");
}
