//! Operator-configured interests: which accounts and which calls/events are
//! worth a notification.
//!
//! All of these are built once at startup and shared read-only between
//! endpoints.

use std::collections::HashSet;

use serde::Serialize;

use super::snapshot::AccountId;

/// A monitored account and the label it is reported under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountEntry {
    /// The monitored address.
    pub address: AccountId,
    /// Human-readable label for the address.
    pub label: String,
}

impl AccountEntry {
    /// Creates a new account entry.
    pub fn new(address: impl Into<AccountId>, label: impl Into<String>) -> Self {
        Self { address: address.into(), label: label.into() }
    }
}

/// The set of monitored accounts, keyed by address.
///
/// An empty filter means every account is of interest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountFilter {
    entries: Vec<AccountEntry>,
}

impl AccountFilter {
    /// Creates a filter from a list of entries. Later entries with an address
    /// already present are ignored.
    pub fn new(entries: impl IntoIterator<Item = AccountEntry>) -> Self {
        let mut seen = HashSet::new();
        let entries =
            entries.into_iter().filter(|entry| seen.insert(entry.address.clone())).collect();
        Self { entries }
    }

    /// Returns `true` when no account is configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of monitored accounts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates over the monitored accounts.
    pub fn iter(&self) -> impl Iterator<Item = &AccountEntry> {
        self.entries.iter()
    }

    /// Looks up the entry for an exact address.
    pub fn by_address(&self, address: &AccountId) -> Option<&AccountEntry> {
        self.entries.iter().find(|entry| &entry.address == address)
    }

    /// Returns the first monitored account whose address appears anywhere in
    /// `payload`.
    pub fn mentioned_in(&self, payload: &str) -> Option<&AccountEntry> {
        self.entries.iter().find(|entry| payload.contains(entry.address.as_str()))
    }
}

/// A set of `section.method` names.
///
/// An empty filter matches everything, so leaving a filter out of the
/// configuration means "monitor all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodFilter {
    names: HashSet<String>,
}

impl MethodFilter {
    /// Creates a filter that matches every call or event.
    pub fn all() -> Self {
        Self::default()
    }

    /// Returns `true` when the filter matches everything.
    pub fn is_match_all(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns `true` when `qualified_name` (`section.method`) passes the
    /// filter.
    pub fn allows(&self, qualified_name: &str) -> bool {
        self.names.is_empty() || self.names.contains(qualified_name)
    }

    /// Number of names in the filter.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` when the filter holds no names.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for MethodFilter {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self { names: iter.into_iter().map(Into::into).collect() }
    }
}

/// Everything the filter stage needs to decide what ends up in a report.
#[derive(Debug, Clone, Default)]
pub struct Interests {
    /// Monitored accounts.
    pub accounts: AccountFilter,
    /// Extrinsic `section.method` names of interest.
    pub extrinsic_methods: MethodFilter,
    /// Event `section.method` names of interest.
    pub event_methods: MethodFilter,
}
