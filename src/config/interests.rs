//! The accepted shapes of the account and method filter settings, and their
//! normalization into [`Interests`].
//!
//! Operators have written these settings in several ways over time. Every
//! accepted shape is folded into the single [`AccountFilter`] /
//! [`MethodFilter`] representation here, so nothing downstream needs to know
//! about them.

use std::str::FromStr;

use serde::Deserialize;
use subxt::utils::AccountId32;

use crate::models::{AccountEntry, AccountFilter, Interests, MethodFilter};

/// One monitored account as written in the configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum AccountSpec {
    /// A bare address; the address doubles as the label.
    Address(String),
    /// An `[address, label]` pair.
    Pair(String, String),
    /// An object with an address and an optional label.
    Labeled {
        /// The monitored address.
        address: String,
        /// The label; `nickname` is accepted as well.
        #[serde(default, alias = "nickname")]
        label: Option<String>,
    },
}

impl AccountSpec {
    /// Normalizes the configured account into an [`AccountEntry`].
    pub fn to_entry(&self) -> AccountEntry {
        let (address, label) = match self {
            AccountSpec::Address(address) => (address, None),
            AccountSpec::Pair(address, label) => (address, Some(label)),
            AccountSpec::Labeled { address, label } => (address, label.as_ref()),
        };
        let address = normalize_address(address);
        let label = label.cloned().unwrap_or_else(|| address.clone());
        AccountEntry::new(address, label)
    }
}

/// Re-encodes an SS58 address in the generic Substrate format, the form the
/// RPC adapter renders accounts in. Anything that does not parse is kept as
/// written.
pub fn normalize_address(address: &str) -> String {
    let trimmed = address.trim();
    match AccountId32::from_str(trimmed) {
        Ok(account) => account.to_string(),
        Err(_) => {
            tracing::warn!(address = trimmed, "Account is not a valid SS58 address, matching it verbatim.");
            trimmed.to_string()
        }
    }
}

/// A method filter as written in the configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum MethodFilterSpec {
    /// `"all"`, or a single `section.method` name.
    Single(String),
    /// A list of `section.method` names.
    List(Vec<String>),
}

impl Default for MethodFilterSpec {
    fn default() -> Self {
        MethodFilterSpec::Single(ALL.to_string())
    }
}

const ALL: &str = "all";

impl MethodFilterSpec {
    /// The names in the filter; empty means everything.
    pub fn names(&self) -> Vec<&str> {
        match self {
            MethodFilterSpec::Single(name) if name.eq_ignore_ascii_case(ALL) => Vec::new(),
            MethodFilterSpec::Single(name) => vec![name.as_str()],
            MethodFilterSpec::List(names) => names.iter().map(String::as_str).collect(),
        }
    }

    /// Returns the first name that is not of the form `section.method`.
    pub fn invalid_name(&self) -> Option<&str> {
        self.names().into_iter().find(|name| match name.split_once('.') {
            Some((section, method)) => section.is_empty() || method.is_empty() || method.contains('.'),
            None => true,
        })
    }

    /// Normalizes the spec into a [`MethodFilter`].
    pub fn to_filter(&self) -> MethodFilter {
        self.names().into_iter().map(|name| name.trim().to_string()).collect()
    }
}

/// Builds the read-only [`Interests`] shared by every endpoint.
pub fn build_interests(
    accounts: &[AccountSpec],
    extrinsic_filter: &MethodFilterSpec,
    event_filter: &MethodFilterSpec,
) -> Interests {
    Interests {
        accounts: AccountFilter::new(accounts.iter().map(AccountSpec::to_entry)),
        extrinsic_methods: extrinsic_filter.to_filter(),
        event_methods: event_filter.to_filter(),
    }
}
