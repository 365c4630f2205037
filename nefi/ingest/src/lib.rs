//! The ingestion server (spec §4.4): the `StreamEvents` gRPC endpoint.

pub mod service;

pub use service::IngestService;
