//! Raw per-block data handed over by the RPC collaborator.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::header::BlockHash;

/// An account identifier in the textual form the data source renders it in.
///
/// The core only ever compares these for equality or looks for them inside
/// payload strings; it never interprets their contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Creates an account id from its textual form.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Returns the textual form of the account id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// An extrinsic as found in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawExtrinsic {
    /// Position of the extrinsic within the block.
    pub index: u32,
    /// Whether the extrinsic carries a signature.
    pub signed: bool,
    /// The signer, when the extrinsic is signed and the address is resolvable.
    pub signer: Option<AccountId>,
    /// Pallet name of the call.
    pub section: String,
    /// Call name within the pallet.
    pub method: String,
    /// Human-readable rendering of the call and its arguments.
    pub payload: String,
}

/// An event emitted while executing a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawEvent {
    /// Pallet name of the event.
    pub section: String,
    /// Event name within the pallet.
    pub method: String,
    /// Human-readable rendering of the event fields.
    pub payload: String,
}

/// A consistent view of one finalized block: its extrinsics and the events
/// emitted when executing it.
///
/// Built once per height and never modified afterwards; filtering always
/// produces new lists derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSnapshot {
    /// Chain name as reported by the node.
    pub chain: String,
    /// Block number.
    pub height: u64,
    /// Block hash.
    pub hash: BlockHash,
    /// Block timestamp in milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Extrinsics in block order.
    pub extrinsics: Vec<RawExtrinsic>,
    /// Events in emission order.
    pub events: Vec<RawEvent>,
}

/// Joins a section and a method into the `section.method` form used by
/// method filters.
pub(crate) fn qualified_name(section: &str, method: &str) -> String {
    format!("{section}.{method}")
}

impl RawExtrinsic {
    /// Returns the `section.method` name of the call.
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.section, &self.method)
    }
}

impl RawEvent {
    /// Returns the `section.method` name of the event.
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.section, &self.method)
    }
}
