use std::collections::BTreeSet;

use async_trait::async_trait;
use nefi_core::{ConnectionEvent, DependencyLink, MetricType, RequestEvent, TimeSeriesPoint};

use crate::error::StorageError;
use crate::query::{EventQuery, MetricQuery, TimeRange};

/// The capability set every storage backend (spec §4.7) implements.
/// Readers honour time-range and service filters; writers may batch and
/// flush on their own size/interval policy.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn write_connections(&self, batch: &[ConnectionEvent]) -> Result<(), StorageError>;
    async fn write_requests(&self, batch: &[RequestEvent]) -> Result<(), StorageError>;
    async fn write_dependencies(&self, links: &[DependencyLink]) -> Result<(), StorageError>;
    async fn write_metrics(
        &self,
        points: &[TimeSeriesPoint],
        metric_type: MetricType,
    ) -> Result<(), StorageError>;

    async fn find_connections(
        &self,
        query: &EventQuery,
    ) -> Result<Vec<ConnectionEvent>, StorageError>;
    async fn find_requests(&self, query: &EventQuery) -> Result<Vec<RequestEvent>, StorageError>;

    async fn get_dependencies(&self, range: &TimeRange)
        -> Result<Vec<DependencyLink>, StorageError>;

    async fn get_latencies(&self, query: &MetricQuery) -> Result<Vec<TimeSeriesPoint>, StorageError>;
    async fn get_call_rates(&self, query: &MetricQuery) -> Result<Vec<TimeSeriesPoint>, StorageError>;
    async fn get_error_rates(&self, query: &MetricQuery) -> Result<Vec<TimeSeriesPoint>, StorageError>;

    async fn list_services(&self) -> Result<BTreeSet<String>, StorageError>;
    async fn list_operations(&self, service: &str) -> Result<BTreeSet<String>, StorageError>;
}
