//! The export client (spec §4.3): a bounded per-node queue drained over a
//! reconnecting gRPC client-stream to the collector.

pub mod client;
pub mod config;
pub mod error;
pub mod queue;

pub use client::ExportClient;
pub use config::ExportConfig;
pub use error::ExportError;
pub use queue::BoundedQueue;
