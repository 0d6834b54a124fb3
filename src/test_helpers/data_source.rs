//! An in-memory `DataSource` driven by a script of subscriptions.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Mutex,
};

use async_trait::async_trait;
use futures::{StreamExt, stream};

use super::snapshot::{SnapshotBuilder, hash_for_height};
use crate::{
    models::{BlockHash, BlockSnapshot, Header},
    providers::traits::{DataSource, DataSourceError, HeaderStream},
};

/// What a scripted subscription does after its headers are consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    Close,
    Hang,
}

/// A `DataSource` serving synthetic blocks.
///
/// Every height exists unless marked missing, with the hash from
/// [`hash_for_height`] and an empty snapshot unless one was registered. Each
/// call to `subscribe_finalized_heads` consumes the next scripted batch of
/// announced heights; once the script is exhausted, subscribing fails.
pub struct ScriptedDataSource {
    chain: String,
    subscriptions: Mutex<VecDeque<(Vec<u64>, StreamEnd)>>,
    snapshots: HashMap<u64, BlockSnapshot>,
    missing: HashSet<u64>,
    unreachable: bool,
    header_requests: Mutex<Vec<u64>>,
    snapshot_requests: Mutex<Vec<u64>>,
}

impl ScriptedDataSource {
    /// Creates a data source for `chain` with an empty script.
    pub fn new(chain: &str) -> Self {
        Self {
            chain: chain.to_string(),
            subscriptions: Mutex::new(VecDeque::new()),
            snapshots: HashMap::new(),
            missing: HashSet::new(),
            unreachable: false,
            header_requests: Mutex::new(Vec::new()),
            snapshot_requests: Mutex::new(Vec::new()),
        }
    }

    /// Scripts a subscription announcing `heights`, then ending.
    pub fn subscription(self, heights: &[u64]) -> Self {
        self.push(heights, StreamEnd::Close)
    }

    /// Scripts a subscription announcing `heights`, then staying open.
    pub fn hanging_subscription(self, heights: &[u64]) -> Self {
        self.push(heights, StreamEnd::Hang)
    }

    fn push(self, heights: &[u64], end: StreamEnd) -> Self {
        if let Ok(mut subscriptions) = self.subscriptions.lock() {
            subscriptions.push_back((heights.to_vec(), end));
        }
        self
    }

    /// Registers the snapshot served for its height.
    pub fn snapshot(mut self, snapshot: BlockSnapshot) -> Self {
        self.snapshots.insert(snapshot.height, snapshot);
        self
    }

    /// Makes a height unavailable for header and snapshot queries.
    pub fn missing(mut self, height: u64) -> Self {
        self.missing.insert(height);
        self
    }

    /// Makes the node refuse every request, starting with `chain_name`.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Heights requested through `header_by_height`, in order.
    pub fn header_requests(&self) -> Vec<u64> {
        self.header_requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Heights requested through `fetch_snapshot`, in order.
    pub fn snapshot_requests(&self) -> Vec<u64> {
        self.snapshot_requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn header(&self, height: u64) -> Result<Header, DataSourceError> {
        if self.missing.contains(&height) {
            return Err(DataSourceError::BlockNotFound(height));
        }
        Ok(Header::new(height, hash_for_height(height)))
    }
}

#[async_trait]
impl DataSource for ScriptedDataSource {
    async fn chain_name(&self) -> Result<String, DataSourceError> {
        if self.unreachable {
            return Err(DataSourceError::SubscriptionClosed("connection refused".to_string()));
        }
        Ok(self.chain.clone())
    }

    async fn subscribe_finalized_heads(&self) -> Result<HeaderStream, DataSourceError> {
        let next = self.subscriptions.lock().ok().and_then(|mut s| s.pop_front());
        let Some((heights, end)) = next else {
            return Err(DataSourceError::SubscriptionClosed("connection refused".to_string()));
        };

        let headers: Vec<Result<Header, DataSourceError>> =
            heights.into_iter().map(|height| Ok(Header::new(height, hash_for_height(height)))).collect();
        let headers = stream::iter(headers);
        Ok(match end {
            StreamEnd::Close => headers.boxed(),
            StreamEnd::Hang => headers.chain(stream::pending()).boxed(),
        })
    }

    async fn block_hash(&self, height: u64) -> Result<BlockHash, DataSourceError> {
        self.header(height).map(|header| header.hash)
    }

    async fn header_by_height(&self, height: u64) -> Result<Header, DataSourceError> {
        if let Ok(mut requests) = self.header_requests.lock() {
            requests.push(height);
        }
        self.header(height)
    }

    async fn fetch_snapshot(&self, header: &Header) -> Result<BlockSnapshot, DataSourceError> {
        if let Ok(mut requests) = self.snapshot_requests.lock() {
            requests.push(header.height);
        }
        if self.missing.contains(&header.height) {
            return Err(DataSourceError::BlockNotFound(header.height));
        }
        Ok(self.snapshots.get(&header.height).cloned().unwrap_or_else(|| {
            SnapshotBuilder::new().chain(&self.chain).height(header.height).build()
        }))
    }
}
