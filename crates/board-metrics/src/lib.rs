//! Project board metrics
//!
//! [`AggregationEngine`] turns a [`board_source::DataSource`] into a
//! board tree and counters, [`formatter`] renders them as exposition text,
//! and [`RefreshingCache`] keeps the latest text ready for readers.

mod cache;
mod engine;
mod exporter;
pub mod formatter;
#[cfg(test)]
mod testing;

pub use cache::{CacheHandle, Recompute, RefreshOutcome, RefreshingCache};
pub use engine::AggregationEngine;
pub use exporter::BoardExporter;
pub use formatter::{render, BoardReport};
