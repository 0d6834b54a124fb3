//! Sinks with scripted behavior, for exercising the dispatcher.

use std::{
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    models::Report,
    sinks::{Sink, SinkError},
};

/// Records every delivered report.
#[derive(Debug, Default)]
pub struct RecordingSink {
    name: String,
    reports: Mutex<Vec<Report>>,
}

impl RecordingSink {
    /// Creates a new recording sink.
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), reports: Mutex::new(Vec::new()) }
    }

    /// The reports delivered so far, in delivery order.
    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().map(|reports| reports.clone()).unwrap_or_default()
    }

    /// Heights of the reports delivered so far.
    pub fn heights(&self) -> Vec<u64> {
        self.reports().iter().map(Report::height).collect()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, report: &Report) -> Result<(), SinkError> {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report.clone());
        }
        Ok(())
    }
}

/// Fails every delivery.
#[derive(Debug)]
pub struct FailingSink {
    name: String,
}

impl FailingSink {
    /// Creates a new failing sink.
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

#[async_trait]
impl Sink for FailingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, _report: &Report) -> Result<(), SinkError> {
        Err(SinkError::Rejected { status: 401, body: "unauthorized".to_string() })
    }
}

/// Panics on every delivery.
#[derive(Debug)]
pub struct PanickingSink {
    name: String,
}

impl PanickingSink {
    /// Creates a new panicking sink.
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

#[async_trait]
impl Sink for PanickingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, _report: &Report) -> Result<(), SinkError> {
        panic!("{} exploded", self.name)
    }
}

/// Succeeds after a delay.
#[derive(Debug)]
pub struct SlowSink {
    name: String,
    delay: Duration,
    delivered: AtomicUsize,
}

impl SlowSink {
    /// Creates a sink that takes `delay` per delivery.
    pub fn new(name: &str, delay: Duration) -> Self {
        Self { name: name.to_string(), delay, delivered: AtomicUsize::new(0) }
    }

    /// Number of completed deliveries.
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for SlowSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, _report: &Report) -> Result<(), SinkError> {
        tokio::time::sleep(self.delay).await;
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
