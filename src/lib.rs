#![warn(missing_docs)]
//! Chain Sentinel watches finalized blocks on Substrate chains and forwards
//! the extrinsics and events that concern monitored accounts to notification
//! sinks.

pub mod config;
pub mod engine;
pub mod http_client;
pub mod http_server;
pub mod models;
pub mod providers;
pub mod sinks;
pub mod supervisor;
pub mod test_helpers;
