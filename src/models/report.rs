//! The notification unit produced for a block with matches.

use serde::Serialize;

use super::{header::BlockHash, snapshot::AccountId};

/// Label used when an extrinsic matched because a monitored account appears
/// in its arguments rather than as its signer.
pub const RECIPIENT_LABEL: &str = "Monitored Account is Recipient";

/// Label used when no account filter is configured and the signer is not a
/// known account.
pub const UNLABELED: &str = "unlabeled";

/// How an extrinsic relates to the monitored accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccountMatch {
    /// The signer is a monitored account.
    Labeled {
        /// The signer address.
        address: AccountId,
        /// The configured label of the signer.
        label: String,
    },
    /// A monitored account is mentioned in the call arguments.
    Recipient {
        /// The monitored address found in the payload.
        address: AccountId,
        /// The signer of the extrinsic, if any.
        signer: Option<AccountId>,
    },
    /// No account filter applies; the extrinsic is reported for everyone.
    Unlabeled {
        /// The signer of the extrinsic, if any.
        signer: Option<AccountId>,
    },
}

impl AccountMatch {
    /// The label to show for this match.
    pub fn label(&self) -> &str {
        match self {
            AccountMatch::Labeled { label, .. } => label,
            AccountMatch::Recipient { .. } => RECIPIENT_LABEL,
            AccountMatch::Unlabeled { .. } => UNLABELED,
        }
    }

    /// The most relevant address for this match: the monitored account when
    /// there is one, the signer otherwise.
    pub fn address(&self) -> Option<&AccountId> {
        match self {
            AccountMatch::Labeled { address, .. } | AccountMatch::Recipient { address, .. } =>
                Some(address),
            AccountMatch::Unlabeled { signer } => signer.as_ref(),
        }
    }
}

/// One matched extrinsic or event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportItem {
    /// A matched extrinsic.
    Extrinsic {
        /// Position in the block.
        index: u32,
        /// Pallet name.
        section: String,
        /// Call name.
        method: String,
        /// Which monitored account caused the match.
        account: AccountMatch,
        /// Human-readable call payload.
        payload: String,
    },
    /// A matched event.
    Event {
        /// Pallet name.
        section: String,
        /// Event name.
        method: String,
        /// Human-readable event payload.
        payload: String,
    },
}

impl ReportItem {
    /// The pallet name of the item.
    pub fn section(&self) -> &str {
        match self {
            ReportItem::Extrinsic { section, .. } | ReportItem::Event { section, .. } => section,
        }
    }

    /// The call or event name of the item.
    pub fn method(&self) -> &str {
        match self {
            ReportItem::Extrinsic { method, .. } | ReportItem::Event { method, .. } => method,
        }
    }

    /// The human-readable payload of the item.
    pub fn payload(&self) -> &str {
        match self {
            ReportItem::Extrinsic { payload, .. } | ReportItem::Event { payload, .. } => payload,
        }
    }

    /// `"extrinsic"` or `"event"`.
    pub fn kind(&self) -> &'static str {
        match self {
            ReportItem::Extrinsic { .. } => "extrinsic",
            ReportItem::Event { .. } => "event",
        }
    }
}

/// Everything worth notifying about one block.
///
/// A report always holds at least one item, and is never modified once
/// built; sinks only ever see it by shared reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    chain: String,
    height: u64,
    hash: BlockHash,
    timestamp: u64,
    items: Vec<ReportItem>,
}

impl Report {
    /// Builds a report, or returns `None` when there is nothing to report.
    pub fn new(
        chain: impl Into<String>,
        height: u64,
        hash: BlockHash,
        timestamp: u64,
        items: Vec<ReportItem>,
    ) -> Option<Self> {
        if items.is_empty() {
            return None;
        }
        Some(Self { chain: chain.into(), height, hash, timestamp, items })
    }

    /// Chain name.
    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// Block number.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Block hash.
    pub fn hash(&self) -> &BlockHash {
        &self.hash
    }

    /// Block timestamp in milliseconds.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Matched items, extrinsics first (by index) then events (in emission
    /// order).
    pub fn items(&self) -> &[ReportItem] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(method: &str) -> ReportItem {
        ReportItem::Event {
            section: "balances".into(),
            method: method.into(),
            payload: "{}".into(),
        }
    }

    #[test]
    fn test_report_requires_items() {
        assert!(Report::new("Polkadot", 1, BlockHash::default(), 0, vec![]).is_none());
        let report = Report::new("Polkadot", 1, BlockHash::default(), 0, vec![event("Deposit")]);
        assert_eq!(report.unwrap().items().len(), 1);
    }

    #[test]
    fn test_account_match_labels() {
        let labeled =
            AccountMatch::Labeled { address: "alice".into(), label: "Alice".to_string() };
        let recipient = AccountMatch::Recipient { address: "bob".into(), signer: None };
        let unlabeled = AccountMatch::Unlabeled { signer: Some("carol".into()) };

        assert_eq!(labeled.label(), "Alice");
        assert_eq!(recipient.label(), RECIPIENT_LABEL);
        assert_eq!(unlabeled.label(), UNLABELED);
        assert_eq!(unlabeled.address().map(AccountId::as_str), Some("carol"));
    }

    #[test]
    fn test_report_item_serializes_with_type_tag() {
        let json = serde_json::to_value(event("Transfer")).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["method"], "Transfer");
    }
}
