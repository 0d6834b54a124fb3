//! This module provides the `DataSource` implementation backed by a Substrate
//! node's WebSocket JSON-RPC interface.

use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use futures::StreamExt;
use subxt::{
    OnlineClient, PolkadotConfig,
    backend::{legacy::LegacyRpcMethods, rpc::RpcClient},
    config::Header as _,
    utils::H256,
};
use tokio::sync::Mutex;
use url::Url;

use super::{
    block_fetcher::SnapshotFetcher,
    traits::{DataSource, DataSourceError, HeaderStream},
};
use crate::models::{BlockHash, BlockSnapshot, Header};

type NodeHeader = <PolkadotConfig as subxt::Config>::Header;

fn provider_error(e: impl std::error::Error + Send + Sync + 'static) -> DataSourceError {
    DataSourceError::Provider(Box::new(e))
}

fn to_header(header: &NodeHeader) -> Header {
    Header::new(header.number().into(), BlockHash(header.hash().0))
}

/// One live WebSocket connection to a node.
struct Connection {
    rpc: LegacyRpcMethods<PolkadotConfig>,
    fetcher: SnapshotFetcher,
    chain: String,
}

impl Connection {
    #[tracing::instrument(level = "debug")]
    async fn open(url: &Url) -> Result<Self, DataSourceError> {
        let rpc_client = if url.scheme() == "wss" {
            RpcClient::from_url(url.as_str()).await
        } else {
            RpcClient::from_insecure_url(url.as_str()).await
        }
        .map_err(provider_error)?;

        let rpc = LegacyRpcMethods::<PolkadotConfig>::new(rpc_client.clone());
        let api =
            OnlineClient::<PolkadotConfig>::from_rpc_client(rpc_client).await.map_err(provider_error)?;
        let chain = rpc.system_chain().await.map_err(provider_error)?;

        tracing::info!(%url, chain = %chain, "Connected to node.");
        Ok(Self { rpc, fetcher: SnapshotFetcher::new(api), chain })
    }
}

/// Holds the current connection and decides when a new one is opened.
///
/// A connection serves at most one finality subscription. Once that
/// subscription ended, the socket may be gone, so the next subscription
/// always starts on a fresh connection. Queries use whatever connection is
/// current.
struct ConnectionSlot<C> {
    current: Mutex<Option<Current<C>>>,
}

struct Current<C> {
    connection: Arc<C>,
    subscribed: bool,
}

impl<C> ConnectionSlot<C> {
    fn new() -> Self {
        Self { current: Mutex::new(None) }
    }

    /// Returns the current connection, opening one if there is none.
    async fn get<F, Fut>(&self, open: F) -> Result<Arc<C>, DataSourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C, DataSourceError>>,
    {
        let mut current = self.current.lock().await;
        if let Some(current) = current.as_ref() {
            return Ok(current.connection.clone());
        }
        let connection = Arc::new(open().await?);
        *current = Some(Current { connection: connection.clone(), subscribed: false });
        Ok(connection)
    }

    /// Returns a connection nobody has subscribed on yet, replacing the
    /// current one if it already carried a subscription.
    async fn for_subscription<F, Fut>(&self, open: F) -> Result<Arc<C>, DataSourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C, DataSourceError>>,
    {
        let mut current = self.current.lock().await;
        if let Some(current) = current.as_mut().filter(|current| !current.subscribed) {
            current.subscribed = true;
            return Ok(current.connection.clone());
        }
        // Drop the used connection first so a failed reconnect is retried
        // from scratch.
        *current = None;
        let connection = Arc::new(open().await?);
        *current = Some(Current { connection: connection.clone(), subscribed: true });
        Ok(connection)
    }
}

/// A `DataSource` implementation that reads finalized blocks from a Substrate
/// node.
///
/// The node is contacted lazily on first use and reconnected for every new
/// finality subscription. `ws://` URLs are accepted as well as `wss://`;
/// operators are expected to only use plain connections to nodes they run
/// themselves.
pub struct SubstrateSource {
    url: Url,
    slot: ConnectionSlot<Connection>,
}

impl SubstrateSource {
    /// Creates a source for the node at `url` without connecting yet.
    pub fn new(url: Url) -> Self {
        Self { url, slot: ConnectionSlot::new() }
    }

    async fn connection(&self) -> Result<Arc<Connection>, DataSourceError> {
        self.slot.get(|| Connection::open(&self.url)).await
    }
}

#[async_trait]
impl DataSource for SubstrateSource {
    async fn chain_name(&self) -> Result<String, DataSourceError> {
        Ok(self.connection().await?.chain.clone())
    }

    #[tracing::instrument(skip(self), fields(url = %self.url), level = "debug")]
    async fn subscribe_finalized_heads(&self) -> Result<HeaderStream, DataSourceError> {
        let connection = self.slot.for_subscription(|| Connection::open(&self.url)).await?;
        let subscription =
            connection.rpc.chain_subscribe_finalized_heads().await.map_err(provider_error)?;
        tracing::debug!("Subscribed to finalized heads.");
        Ok(subscription
            .map(|item| item.map(|header| to_header(&header)).map_err(provider_error))
            .boxed())
    }

    #[tracing::instrument(skip(self), fields(url = %self.url), level = "debug")]
    async fn block_hash(&self, height: u64) -> Result<BlockHash, DataSourceError> {
        let hash = self
            .connection()
            .await?
            .rpc
            .chain_get_block_hash(Some(height.into()))
            .await
            .map_err(provider_error)?
            .ok_or(DataSourceError::BlockNotFound(height))?;
        Ok(BlockHash(hash.0))
    }

    #[tracing::instrument(skip(self), fields(url = %self.url), level = "debug")]
    async fn header_by_height(&self, height: u64) -> Result<Header, DataSourceError> {
        let hash = self.block_hash(height).await?;
        let header = self
            .connection()
            .await?
            .rpc
            .chain_get_header(Some(H256(hash.0)))
            .await
            .map_err(provider_error)?
            .ok_or(DataSourceError::BlockNotFound(height))?;

        let header = to_header(&header);
        if header.height != height {
            return Err(DataSourceError::HeightMismatch { requested: height, returned: header.height });
        }
        Ok(header)
    }

    async fn fetch_snapshot(&self, header: &Header) -> Result<BlockSnapshot, DataSourceError> {
        let connection = self.connection().await?;
        connection.fetcher.fetch(&connection.chain, header).await.map_err(|e| {
            tracing::error!(chain = %connection.chain, height = header.height, error = %e, "Failed to fetch block snapshot.");
            provider_error(e)
        })
    }
}
