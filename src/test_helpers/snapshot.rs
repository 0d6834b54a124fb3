//! Builders for block snapshots and their items.

use crate::models::{AccountId, BlockHash, BlockSnapshot, RawEvent, RawExtrinsic, ReportItem};

/// A deterministic hash for a height, so tests can tell blocks apart.
pub fn hash_for_height(height: u64) -> BlockHash {
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&height.to_be_bytes());
    BlockHash(bytes)
}

/// A builder for creating `BlockSnapshot` instances for testing.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    chain: String,
    height: u64,
    hash: Option<BlockHash>,
    timestamp: u64,
    extrinsics: Vec<RawExtrinsic>,
    events: Vec<RawEvent>,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self {
            chain: "Polkadot".to_string(),
            height: 1,
            hash: None,
            timestamp: 0,
            extrinsics: Vec::new(),
            events: Vec::new(),
        }
    }
}

impl SnapshotBuilder {
    /// Creates a new `SnapshotBuilder`.
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

    /// Sets the block hash. Defaults to [`hash_for_height`].
    pub fn hash(mut self, hash: BlockHash) -> Self {
        self.hash = Some(hash);
        self
    }

    /// Sets the block timestamp in milliseconds.
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Adds an extrinsic.
    pub fn extrinsic(mut self, extrinsic: RawExtrinsic) -> Self {
        self.extrinsics.push(extrinsic);
        self
    }

    /// Adds an event.
    pub fn event(mut self, event: RawEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Builds the `BlockSnapshot`.
    pub fn build(self) -> BlockSnapshot {
        BlockSnapshot {
            chain: self.chain,
            height: self.height,
            hash: self.hash.unwrap_or_else(|| hash_for_height(self.height)),
            timestamp: self.timestamp,
            extrinsics: self.extrinsics,
            events: self.events,
        }
    }
}

/// A builder for creating `RawExtrinsic` instances for testing. Unsigned
/// `system.remark` with an empty object payload unless told otherwise.
#[derive(Debug, Clone)]
pub struct ExtrinsicBuilder {
    extrinsic: RawExtrinsic,
}

impl ExtrinsicBuilder {
    /// Creates a builder for the extrinsic at `index`.
    pub fn new(index: u32) -> Self {
        Self {
            extrinsic: RawExtrinsic {
                index,
                signed: false,
                signer: None,
                section: "system".to_string(),
                method: "remark".to_string(),
                payload: "{}".to_string(),
            },
        }
    }

    /// Marks the extrinsic as signed by `signer`.
    pub fn signer(mut self, signer: &str) -> Self {
        self.extrinsic.signed = true;
        self.extrinsic.signer = Some(AccountId::from(signer));
        self
    }

    /// Sets the pallet and call name.
    pub fn call(mut self, section: &str, method: &str) -> Self {
        self.extrinsic.section = section.to_string();
        self.extrinsic.method = method.to_string();
        self
    }

    /// Sets the rendered payload.
    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.extrinsic.payload = payload.into();
        self
    }

    /// Builds the `RawExtrinsic`.
    pub fn build(self) -> RawExtrinsic {
        self.extrinsic
    }
}

/// A builder for creating `RawEvent` instances for testing.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    event: RawEvent,
}

impl EventBuilder {
    /// Creates a builder for `section.method` with an empty object payload.
    pub fn new(section: &str, method: &str) -> Self {
        Self {
            event: RawEvent {
                section: section.to_string(),
                method: method.to_string(),
                payload: "{}".to_string(),
            },
        }
    }

    /// Sets the rendered payload.
    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.event.payload = payload.into();
        self
    }

    /// Builds the `RawEvent`.
    pub fn build(self) -> RawEvent {
        self.event
    }

    /// Builds the event as a matched `ReportItem`.
    pub fn build_item(self) -> ReportItem {
        ReportItem::Event {
            section: self.event.section,
            method: self.event.method,
            payload: self.event.payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_builder_defaults() {
        let snapshot = SnapshotBuilder::new().height(300).build();
        assert_eq!(snapshot.chain, "Polkadot");
        assert_eq!(snapshot.hash, hash_for_height(300));
        assert_ne!(hash_for_height(300), hash_for_height(301));
    }

    #[test]
    fn test_extrinsic_builder_signer_marks_signed() {
        let extrinsic = ExtrinsicBuilder::new(2).signer("5Alice").build();
        assert!(extrinsic.signed);
        assert_eq!(extrinsic.signer, Some(AccountId::from("5Alice")));
        assert_eq!(extrinsic.qualified_name(), "system.remark");
    }
}
