//! Access to the ledger: the `DataSource` abstraction the pipeline depends on
//! and its Substrate implementation.

pub mod block_fetcher;
pub mod payload;
pub mod rpc;
pub mod traits;

pub use rpc::SubstrateSource;
pub use traits::{DataSource, DataSourceError, HeaderStream};
