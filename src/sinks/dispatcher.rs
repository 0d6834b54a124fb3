use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use futures::{FutureExt, future::join_all};

use super::{Sink, SinkError};
use crate::models::Report;

/// Outcome of one dispatch round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Sinks that accepted the report.
    pub delivered: usize,
    /// Sinks that failed or panicked.
    pub failed: usize,
}

/// Fans a report out to every configured sink.
///
/// Sinks are driven concurrently and in isolation: a sink that errors or
/// panics is logged and counted, and never affects delivery to the others.
/// [`ReportDispatcher::dispatch`] returns once every sink has finished.
pub struct ReportDispatcher {
    sinks: Vec<Arc<dyn Sink>>,
}

impl ReportDispatcher {
    /// Creates a dispatcher for the given sinks.
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self { sinks }
    }

    /// Delivers `report` to all sinks and waits for every attempt to finish.
    pub async fn dispatch(&self, report: &Report) -> DispatchSummary {
        let attempts = self.sinks.iter().map(|sink| async move {
            let result = AssertUnwindSafe(sink.deliver(report))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(SinkError::Panicked(panic_message(panic))));
            (sink.name(), result)
        });

        let mut summary = DispatchSummary::default();
        for (name, result) in join_all(attempts).await {
            match result {
                Ok(()) => summary.delivered += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        sink = name,
                        chain = report.chain(),
                        height = report.height(),
                        error = %e,
                        "Failed to deliver report."
                    );
                }
            }
        }
        summary
    }

    /// Shuts every sink down, logging failures.
    pub async fn shutdown(&self) {
        let results = join_all(self.sinks.iter().map(|sink| async move {
            (sink.name(), sink.shutdown().await)
        }))
        .await;
        for (name, result) in results {
            if let Err(e) = result {
                tracing::warn!(sink = name, error = %e, "Sink did not shut down cleanly.");
            }
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
