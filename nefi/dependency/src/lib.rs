//! The dependency computer (spec §4.6): periodic window scan producing the
//! service dependency graph.

pub mod compute;
pub mod edge;

pub use compute::{DependencyComputer, DEFAULT_INTERVAL, DEFAULT_WINDOW};
pub use edge::EdgeAccumulatorMap;
