//! The storage adapter (spec §4.7): a backend-agnostic capability trait,
//! plus an in-memory reference implementation for tests and local runs.

pub mod adapter;
pub mod error;
pub mod memory;
pub mod query;

pub use adapter::StorageAdapter;
pub use error::StorageError;
pub use memory::InMemoryStorage;
pub use query::{EventQuery, MetricQuery, TimeRange};
