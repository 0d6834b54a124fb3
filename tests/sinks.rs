//! Integration tests for the sinks and the report dispatcher.

use std::{sync::Arc, time::Duration};

use chain_sentinel::{
    config::{HttpRetryConfig, MatrixConfig, SinksConfig},
    http_client::HttpClientPool,
    models::Report,
    sinks::{MatrixSink, ReportDispatcher, Sink, SinkError, build_sinks, template::TemplateService},
    test_helpers::{FailingSink, PanickingSink, RecordingSink, ReportBuilder, SlowSink},
};
use mockito::Matcher;
use serde_json::json;
use url::Url;

fn report() -> Report {
    ReportBuilder::new()
        .chain("Polkadot")
        .height(1_234)
        .event("balances", "Transfer", r#"{"amount":10}"#)
        .build()
}

fn matrix_config(server: &str, max_retries: u32) -> MatrixConfig {
    MatrixConfig {
        server: Url::parse(server).unwrap(),
        room_id: "!room:example.org".to_string(),
        access_token: "secret".to_string(),
        retry_policy: HttpRetryConfig { max_retries, ..Default::default() },
    }
}

async fn matrix_sink(server: &str, max_retries: u32) -> MatrixSink {
    let config = matrix_config(server, max_retries);
    let client = HttpClientPool::new().get_or_create(&config.retry_policy).await.unwrap();
    MatrixSink::new(&config, client, Arc::new(TemplateService::new()))
}

fn send_path() -> Matcher {
    Matcher::Regex(r"^/_matrix/client/v3/rooms/%21room%3Aexample.org/send/m.room.message/sentinel-.+$".to_string())
}

#[tokio::test]
async fn test_matrix_sink_posts_formatted_message() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", send_path())
        .match_header("authorization", "Bearer secret")
        .match_body(Matcher::PartialJson(json!({
            "msgtype": "m.text",
            "format": "org.matrix.custom.html",
        })))
        .with_status(200)
        .with_body(r#"{"event_id":"$abc"}"#)
        .create_async()
        .await;

    let sink = matrix_sink(&server.url(), 0).await;
    let result = sink.deliver(&report()).await;

    assert!(result.is_ok());
    mock.assert();
}

#[tokio::test]
async fn test_matrix_sink_reports_rejection() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", send_path())
        .with_status(403)
        .with_body(r#"{"errcode":"M_FORBIDDEN"}"#)
        .create_async()
        .await;

    let sink = matrix_sink(&server.url(), 0).await;
    let result = sink.deliver(&report()).await;

    assert!(matches!(result, Err(SinkError::Rejected { status: 403, ref body }) if body.contains("M_FORBIDDEN")));
    mock.assert();
}

#[tokio::test]
async fn test_one_failing_sink_does_not_block_the_others() {
    let mut server = mockito::Server::new_async().await;
    let matrix = server.mock("PUT", send_path()).with_status(200).create_async().await;

    let recording = Arc::new(RecordingSink::new("recording"));
    let slow = Arc::new(SlowSink::new("slow", Duration::from_millis(50)));
    let sinks: Vec<Arc<dyn Sink>> = vec![
        Arc::new(FailingSink::new("failing")),
        Arc::new(PanickingSink::new("panicking")),
        slow.clone(),
        Arc::new(matrix_sink(&server.url(), 0).await),
        recording.clone(),
    ];
    let dispatcher = ReportDispatcher::new(sinks);

    let summary = dispatcher.dispatch(&report()).await;

    assert_eq!(summary.delivered, 3);
    assert_eq!(summary.failed, 2);
    assert_eq!(recording.heights(), vec![1_234]);
    assert_eq!(slow.delivered(), 1);
    matrix.assert();
}

#[tokio::test]
async fn test_dispatcher_keeps_working_after_a_panic() {
    let recording = Arc::new(RecordingSink::new("recording"));
    let sinks: Vec<Arc<dyn Sink>> = vec![Arc::new(PanickingSink::new("panicking")), recording.clone()];
    let dispatcher = ReportDispatcher::new(sinks);

    for height in 1..=3 {
        let report = ReportBuilder::new().height(height).event("system", "Remarked", "{}").build();
        let summary = dispatcher.dispatch(&report).await;
        assert_eq!(summary.failed, 1);
    }

    assert_eq!(recording.heights(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_build_sinks_registers_enabled_sinks() {
    let config = SinksConfig {
        console: true,
        matrix: Some(matrix_config("https://matrix.example.org", 3)),
        email: None,
    };
    let pool = HttpClientPool::new();

    let sinks = build_sinks(&config, &pool).await.unwrap();

    let names: Vec<&str> = sinks.iter().map(|sink| sink.name()).collect();
    assert_eq!(names, vec!["console", "matrix"]);
    assert_eq!(pool.len().await, 1);
}
