//! The aggregator (spec §4.5): a per-service histogram accumulator with a
//! tumbling-window flush to storage.

pub mod accumulator;
pub mod flush;

pub use accumulator::AccumulatorMap;
pub use flush::{Aggregator, DEFAULT_FLUSH_INTERVAL};
