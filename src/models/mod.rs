//! This module contains the data models shared by the tracking, filtering and
//! dispatch stages.

pub mod filter;
pub mod header;
pub mod report;
pub mod snapshot;

pub use filter::{AccountEntry, AccountFilter, Interests, MethodFilter};
pub use header::{BlockHash, Header};
pub use report::{AccountMatch, RECIPIENT_LABEL, Report, ReportItem, UNLABELED};
pub use snapshot::{AccountId, BlockSnapshot, RawEvent, RawExtrinsic};
