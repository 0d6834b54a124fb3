//! The engine turns finality notifications into dispatched reports.
//!
//! Per endpoint: the [`endpoint::EndpointRunner`] keeps the subscription
//! alive, the [`head_tracker::HeadTracker`] orders and backfills headers, and
//! the [`pipeline::BlockPipeline`] fetches, filters, assembles and dispatches
//! each block.

pub mod assembler;
pub mod endpoint;
pub mod filtering;
pub mod head_tracker;
pub mod pipeline;
