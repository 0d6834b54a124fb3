//! This module contains the `SnapshotFetcher` component, responsible for
//! retrieving a consistent view of a single finalized block (timestamp,
//! extrinsics and events) from a Substrate node.

use serde_json::json;
use subxt::{
    OnlineClient, PolkadotConfig,
    blocks::ExtrinsicDetails,
    events::EventDetails,
    utils::{AccountId32, H256},
};
use thiserror::Error;

use super::payload::composite_to_json;
use crate::models::{AccountId, BlockSnapshot, Header, RawEvent, RawExtrinsic};

type Client = OnlineClient<PolkadotConfig>;

/// Custom error type for the `SnapshotFetcher`.
#[derive(Error, Debug)]
pub enum BlockFetcherError {
    /// Error when interacting with the node.
    #[error("RPC error: {0}")]
    Rpc(#[from] subxt::Error),

    /// Error when decoding block data against the runtime metadata.
    #[error("Decoding error: {0}")]
    Decode(#[from] subxt::ext::subxt_core::Error),
}

/// A component responsible for fetching all data related to a single block.
pub struct SnapshotFetcher {
    api: Client,
}

impl SnapshotFetcher {
    /// Creates a new `SnapshotFetcher`.
    pub fn new(api: Client) -> Self {
        Self { api }
    }

    /// Fetches the extrinsics and events of the block identified by `header`.
    ///
    /// The timestamp is read from the block's `Timestamp.set` inherent. Items
    /// that cannot be decoded against the runtime metadata are left out of
    /// the snapshot.
    #[tracing::instrument(skip(self), fields(height = header.height), level = "debug")]
    pub async fn fetch(
        &self,
        chain: &str,
        header: &Header,
    ) -> Result<BlockSnapshot, BlockFetcherError> {
        let block = self.api.blocks().at(H256(header.hash.0)).await?;
        let metadata = self.api.metadata();
        let is_account = |type_id: &u32| {
            metadata
                .types()
                .resolve(*type_id)
                .and_then(|ty| ty.path.segments.last())
                .is_some_and(|name| name == "AccountId32")
        };

        let mut timestamp = 0;
        let mut extrinsics = Vec::new();
        for details in block.extrinsics().await?.iter() {
            let raw = details.map_err(BlockFetcherError::from).and_then(|details| {
                if let Some(now) = timestamp_of(&details) {
                    timestamp = now;
                }
                decode_extrinsic(&details, &is_account)
            });
            match raw {
                Ok(raw) => extrinsics.push(raw),
                Err(e) => tracing::warn!(
                    chain,
                    height = header.height,
                    error = %e,
                    "Dropping undecodable extrinsic."
                ),
            }
        }

        let mut events = Vec::new();
        for details in block.events().await?.iter() {
            match details.map_err(BlockFetcherError::from).and_then(|d| decode_event(&d, &is_account))
            {
                Ok(raw) => events.push(raw),
                Err(e) => tracing::warn!(
                    chain,
                    height = header.height,
                    error = %e,
                    "Dropping undecodable event."
                ),
            }
        }

        tracing::debug!(
            chain,
            height = header.height,
            extrinsics = extrinsics.len(),
            events = events.len(),
            "Fetched block snapshot."
        );

        Ok(BlockSnapshot {
            chain: chain.to_string(),
            height: header.height,
            hash: header.hash,
            timestamp,
            extrinsics,
            events,
        })
    }
}

fn decode_extrinsic(
    details: &ExtrinsicDetails<PolkadotConfig, Client>,
    is_account: &impl Fn(&u32) -> bool,
) -> Result<RawExtrinsic, BlockFetcherError> {
    let section = section_name(details.pallet_name()?);
    let method = call_name(details.variant_name()?);
    let args = composite_to_json(&details.field_values()?, is_account);
    let signer = details.address_bytes().and_then(signer_from_address);

    let payload = json!({
        "isSigned": details.is_signed(),
        "signer": signer,
        "method": { "section": section, "method": method, "args": args },
    });

    Ok(RawExtrinsic {
        index: details.index(),
        signed: details.is_signed(),
        signer,
        section,
        method,
        payload: payload.to_string(),
    })
}

fn decode_event(
    details: &EventDetails<PolkadotConfig>,
    is_account: &impl Fn(&u32) -> bool,
) -> Result<RawEvent, BlockFetcherError> {
    let section = section_name(details.pallet_name());
    let method = details.variant_name().to_string();
    let data = composite_to_json(&details.field_values()?, is_account);

    let payload = json!({ "section": section, "method": method, "data": data });

    Ok(RawEvent { section, method, payload: payload.to_string() })
}

/// Reads the `now` argument of a `timestamp.set` inherent.
fn timestamp_of(details: &ExtrinsicDetails<PolkadotConfig, Client>) -> Option<u64> {
    if section_name(details.pallet_name().ok()?) != "timestamp"
        || call_name(details.variant_name().ok()?) != "set"
    {
        return None;
    }
    let fields = details.field_values().ok()?;
    let now = fields.values().next()?.as_u128()?;
    u64::try_from(now).ok()
}

/// The section name of a pallet as operators write it in filters:
/// `Balances` becomes `balances`, `XcmPallet` becomes `xcmPallet` and a
/// leading acronym is lowered as a whole (`EVM` becomes `evm`).
pub fn section_name(pallet: &str) -> String {
    let chars: Vec<char> = pallet.chars().collect();
    let upper_run = chars.iter().take_while(|c| c.is_uppercase()).count();
    // In `XCMPallet` the `P` starts the next word and stays upper case.
    let lower = if upper_run > 1 && upper_run < chars.len() { upper_run - 1 } else { upper_run };
    chars
        .iter()
        .enumerate()
        .map(|(i, c)| if i < lower.max(1) { c.to_ascii_lowercase() } else { *c })
        .collect()
}

/// The method name of a call as operators write it in filters:
/// `transfer_keep_alive` becomes `transferKeepAlive`.
pub fn call_name(variant: &str) -> String {
    let mut name = String::with_capacity(variant.len());
    let mut upper_next = false;
    for c in variant.chars() {
        if c == '_' {
            upper_next = !name.is_empty();
        } else if upper_next {
            name.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            name.push(c);
        }
    }
    name
}

/// Decodes a signer from the SCALE-encoded address of a signed extrinsic.
///
/// Handles `MultiAddress::Id` (variant byte `0` followed by the account id)
/// and bare 32-byte account ids.
pub fn signer_from_address(bytes: &[u8]) -> Option<AccountId> {
    let raw: [u8; 32] = match bytes {
        [0, rest @ ..] if rest.len() == 32 => rest.try_into().ok()?,
        _ if bytes.len() == 32 => bytes.try_into().ok()?,
        _ => return None,
    };
    Some(AccountId::new(AccountId32(raw).to_string()))
}
