//! A builder for creating `Report` instances for testing.

use super::snapshot::hash_for_height;
use crate::models::{AccountMatch, Report, ReportItem};

/// A builder for creating `Report` instances for testing.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    chain: String,
    height: u64,
    timestamp: u64,
    items: Vec<ReportItem>,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self { chain: "Polkadot".to_string(), height: 1, timestamp: 0, items: Vec::new() }
    }
}

impl ReportBuilder {
    /// Creates a new `ReportBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the chain name.
    pub fn chain(mut self, chain: &str) -> Self {
        self.chain = chain.to_string();
        self
    }

    /// Sets the block height.
    pub fn height(mut self, height: u64) -> Self {
        self.height = height;
        self
    }

    /// Sets the block timestamp in milliseconds.
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Adds a matched extrinsic.
    pub fn extrinsic(
        mut self,
        index: u32,
        section: &str,
        method: &str,
        account: AccountMatch,
        payload: &str,
    ) -> Self {
        self.items.push(ReportItem::Extrinsic {
            index,
            section: section.to_string(),
            method: method.to_string(),
            account,
            payload: payload.to_string(),
        });
        self
    }

    /// Adds a matched event.
    pub fn event(mut self, section: &str, method: &str, payload: &str) -> Self {
        self.items.push(ReportItem::Event {
            section: section.to_string(),
            method: method.to_string(),
            payload: payload.to_string(),
        });
        self
    }

    /// Builds the `Report`.
    ///
    /// # Panics
    ///
    /// Panics when no item was added, since such a report cannot exist.
    pub fn build(self) -> Report {
        Report::new(self.chain, self.height, hash_for_height(self.height), self.timestamp, self.items)
            .expect("ReportBuilder needs at least one item")
    }
}
