//! A set of helpers for testing

mod data_source;
mod report;
mod sinks;
mod snapshot;

pub use data_source::ScriptedDataSource;
pub use report::ReportBuilder;
pub use sinks::{FailingSink, PanickingSink, RecordingSink, SlowSink};
pub use snapshot::{EventBuilder, ExtrinsicBuilder, SnapshotBuilder, hash_for_height};
