//! Decides which extrinsics and events of a block match the configured
//! interests.
//!
//! Everything here is a pure function of its inputs: the snapshot is only
//! read, and the matched items are returned as new lists. That makes the
//! functions safe to call concurrently for different snapshots.

use thiserror::Error;

use crate::models::{
    AccountFilter, AccountMatch, BlockSnapshot, MethodFilter, RawEvent, RawExtrinsic, ReportItem,
};

/// An item that cannot be evaluated against the filters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    /// The extrinsic has no pallet or call name.
    #[error("Extrinsic #{index} is missing its section or method")]
    MalformedExtrinsic {
        /// Position of the extrinsic in the block.
        index: u32,
    },

    /// The event has no pallet or event name.
    #[error("Event #{position} is missing its section or method")]
    MalformedEvent {
        /// Position of the event in the block's event list.
        position: usize,
    },
}

/// Returns the extrinsics of `snapshot` that pass both the method and the
/// account predicate, in block order.
///
/// Malformed extrinsics are logged and left out; they never prevent the
/// rest of the block from being evaluated.
pub fn filter_extrinsics(
    snapshot: &BlockSnapshot,
    accounts: &AccountFilter,
    methods: &MethodFilter,
) -> Vec<ReportItem> {
    snapshot
        .extrinsics
        .iter()
        .filter_map(|extrinsic| match match_extrinsic(extrinsic, accounts, methods) {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(chain = %snapshot.chain, height = snapshot.height, error = %e, "Skipping extrinsic.");
                None
            }
        })
        .collect()
}

/// Returns the events of `snapshot` that pass the method predicate, in
/// emission order.
pub fn filter_events(snapshot: &BlockSnapshot, methods: &MethodFilter) -> Vec<ReportItem> {
    snapshot
        .events
        .iter()
        .enumerate()
        .filter_map(|(position, event)| match match_event(position, event, methods) {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(chain = %snapshot.chain, height = snapshot.height, error = %e, "Skipping event.");
                None
            }
        })
        .collect()
}

fn match_extrinsic(
    extrinsic: &RawExtrinsic,
    accounts: &AccountFilter,
    methods: &MethodFilter,
) -> Result<Option<ReportItem>, FilterError> {
    if extrinsic.section.is_empty() || extrinsic.method.is_empty() {
        return Err(FilterError::MalformedExtrinsic { index: extrinsic.index });
    }

    if !methods.allows(&extrinsic.qualified_name()) {
        return Ok(None);
    }

    let Some(account) = match_account(extrinsic, accounts) else {
        return Ok(None);
    };

    Ok(Some(ReportItem::Extrinsic {
        index: extrinsic.index,
        section: extrinsic.section.clone(),
        method: extrinsic.method.clone(),
        account,
        payload: extrinsic.payload.clone(),
    }))
}

/// The account predicate.
///
/// An empty filter lets everything through. Otherwise a signed extrinsic
/// matches on its signer first; any extrinsic also matches when a monitored
/// address appears in its payload, which covers monitored accounts on the
/// receiving end.
fn match_account(extrinsic: &RawExtrinsic, accounts: &AccountFilter) -> Option<AccountMatch> {
    if accounts.is_empty() {
        return Some(AccountMatch::Unlabeled { signer: extrinsic.signer.clone() });
    }

    if extrinsic.signed {
        if let Some(entry) = extrinsic.signer.as_ref().and_then(|s| accounts.by_address(s)) {
            return Some(AccountMatch::Labeled {
                address: entry.address.clone(),
                label: entry.label.clone(),
            });
        }
    }

    accounts.mentioned_in(&extrinsic.payload).map(|entry| AccountMatch::Recipient {
        address: entry.address.clone(),
        signer: extrinsic.signer.clone(),
    })
}

fn match_event(
    position: usize,
    event: &RawEvent,
    methods: &MethodFilter,
) -> Result<Option<ReportItem>, FilterError> {
    if event.section.is_empty() || event.method.is_empty() {
        return Err(FilterError::MalformedEvent { position });
    }

    if !methods.allows(&event.qualified_name()) {
        return Ok(None);
    }

    Ok(Some(ReportItem::Event {
        section: event.section.clone(),
        method: event.method.clone(),
        payload: event.payload.clone(),
    }))
}
