//! Builds the single notification unit for a block.

use crate::models::{BlockSnapshot, Report, ReportItem};

/// Combines the matched items of one block into a [`Report`].
///
/// Extrinsics come first, ordered by their position in the block, then the
/// events in the order given. Returns `None` for a block with no matches so
/// that quiet blocks never reach the sinks.
pub fn assemble(
    snapshot: &BlockSnapshot,
    mut extrinsics: Vec<ReportItem>,
    events: Vec<ReportItem>,
) -> Option<Report> {
    extrinsics.sort_by_key(|item| match item {
        ReportItem::Extrinsic { index, .. } => *index,
        ReportItem::Event { .. } => u32::MAX,
    });

    let mut items = extrinsics;
    items.extend(events);

    Report::new(snapshot.chain.clone(), snapshot.height, snapshot.hash, snapshot.timestamp, items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::filtering::{filter_events, filter_extrinsics},
        models::{AccountFilter, MethodFilter},
        test_helpers::{EventBuilder, ExtrinsicBuilder, SnapshotBuilder},
    };

    #[test]
    fn test_quiet_block_produces_no_report() {
        let snapshot = SnapshotBuilder::new().height(5).build();
        assert!(assemble(&snapshot, vec![], vec![]).is_none());
    }

    #[test]
    fn test_items_are_ordered_extrinsics_then_events() {
        let snapshot = SnapshotBuilder::new()
            .chain("Westend")
            .height(42)
            .timestamp(1_700_000_000_000)
            .extrinsic(ExtrinsicBuilder::new(0).call("timestamp", "set").build())
            .extrinsic(ExtrinsicBuilder::new(1).call("balances", "transfer").build())
            .extrinsic(ExtrinsicBuilder::new(2).call("staking", "bond").build())
            .event(EventBuilder::new("balances", "Withdraw").build())
            .event(EventBuilder::new("balances", "Transfer").build())
            .build();

        let mut extrinsics =
            filter_extrinsics(&snapshot, &AccountFilter::default(), &MethodFilter::all());
        extrinsics.reverse();
        let events = filter_events(&snapshot, &MethodFilter::all());

        let report = assemble(&snapshot, extrinsics, events).unwrap();

        let order: Vec<_> = report.items().iter().map(|item| item.method()).collect();
        assert_eq!(order, vec!["set", "transfer", "bond", "Withdraw", "Transfer"]);
        assert_eq!(report.chain(), "Westend");
        assert_eq!(report.height(), 42);
        assert_eq!(report.timestamp(), 1_700_000_000_000);
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let snapshot = SnapshotBuilder::new()
            .extrinsic(ExtrinsicBuilder::new(3).build())
            .extrinsic(ExtrinsicBuilder::new(1).build())
            .event(EventBuilder::new("system", "ExtrinsicSuccess").build())
            .build();
        let build = || {
            assemble(
                &snapshot,
                filter_extrinsics(&snapshot, &AccountFilter::default(), &MethodFilter::all()),
                filter_events(&snapshot, &MethodFilter::all()),
            )
        };

        assert_eq!(build(), build());
    }

    #[test]
    fn test_events_alone_produce_a_report() {
        let snapshot = SnapshotBuilder::new().build();
        let events = vec![EventBuilder::new("balances", "Deposit").build_item()];

        let report = assemble(&snapshot, vec![], events).unwrap();

        assert_eq!(report.items().len(), 1);
        assert_eq!(report.items()[0].kind(), "event");
    }
}
