//! This module defines the interface the pipeline uses to read finalized
//! blocks from a ledger node.

use async_trait::async_trait;
use futures::stream::BoxStream;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::models::{BlockHash, BlockSnapshot, Header};

/// Custom error type for data source operations.
#[derive(Error, Debug)]
pub enum DataSourceError {
    /// Error when parsing the RPC URL.
    #[error("Failed to parse RPC URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Error when interacting with the node.
    #[error("Provider error: {0}")]
    Provider(#[from] Box<dyn std::error::Error + Send + Sync>),

    /// Indicates that the requested block was not found.
    #[error("Block not found: {0}")]
    BlockNotFound(u64),

    /// The node returned a header for a different height than requested.
    #[error("Requested header {requested} but node returned {returned}")]
    HeightMismatch {
        /// The height that was asked for.
        requested: u64,
        /// The height the node answered with.
        returned: u64,
    },

    /// The finality subscription ended or failed.
    #[error("Subscription closed: {0}")]
    SubscriptionClosed(String),
}

/// A stream of finalized headers, in the order the node announces them.
pub type HeaderStream = BoxStream<'static, Result<Header, DataSourceError>>;

/// A trait for a data source that can read finalized blocks.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DataSource: Send + Sync {
    /// The chain name reported by the node.
    async fn chain_name(&self) -> Result<String, DataSourceError>;

    /// Subscribes to finality notifications.
    ///
    /// The stream yields the announced headers only; heights finalized
    /// together with an announced one are not part of the stream.
    async fn subscribe_finalized_heads(&self) -> Result<HeaderStream, DataSourceError>;

    /// Fetches the hash of the finalized block at a given height.
    async fn block_hash(&self, height: u64) -> Result<BlockHash, DataSourceError>;

    /// Fetches the header at a given height.
    async fn header_by_height(&self, height: u64) -> Result<Header, DataSourceError>;

    /// Fetches the timestamp, extrinsics and events of the block identified by
    /// `header`, all as of that block's post-execution state.
    async fn fetch_snapshot(&self, header: &Header) -> Result<BlockSnapshot, DataSourceError>;
}
