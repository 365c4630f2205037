use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use nefi_core::{ConnectionEvent, DependencyLink, Endpoint, MetricType, RequestEvent, TimeSeriesPoint};
use tokio::sync::RwLock;

use crate::adapter::StorageAdapter;
use crate::error::StorageError;
use crate::query::{EventQuery, MetricQuery, TimeRange};

fn event_matches_service(source: &Endpoint, destination: &Endpoint, service: &Option<String>) -> bool {
    match service {
        None => true,
        Some(want) => {
            source.service_name() == Some(want.as_str()) || destination.service_name() == Some(want.as_str())
        }
    }
}

#[derive(Default)]
struct Inner {
    connections: Vec<ConnectionEvent>,
    requests: Vec<RequestEvent>,
    dependencies: Vec<DependencyLink>,
    metrics: HashMap<MetricType, Vec<TimeSeriesPoint>>,
}

/// An in-process reference backend for local development and tests. Not a
/// production persistence layer: everything lives in an `RwLock`-guarded
/// `Vec` with no compaction or retention policy.
#[derive(Default)]
pub struct InMemoryStorage {
    inner: RwLock<Inner>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageAdapter for InMemoryStorage {
    async fn write_connections(&self, batch: &[ConnectionEvent]) -> Result<(), StorageError> {
        self.inner.write().await.connections.extend_from_slice(batch);
        Ok(())
    }

    async fn write_requests(&self, batch: &[RequestEvent]) -> Result<(), StorageError> {
        self.inner.write().await.requests.extend_from_slice(batch);
        Ok(())
    }

    async fn write_dependencies(&self, links: &[DependencyLink]) -> Result<(), StorageError> {
        self.inner.write().await.dependencies.extend_from_slice(links);
        Ok(())
    }

    async fn write_metrics(
        &self,
        points: &[TimeSeriesPoint],
        metric_type: MetricType,
    ) -> Result<(), StorageError> {
        self.inner
            .write()
            .await
            .metrics
            .entry(metric_type)
            .or_default()
            .extend_from_slice(points);
        Ok(())
    }

    async fn find_connections(
        &self,
        query: &EventQuery,
    ) -> Result<Vec<ConnectionEvent>, StorageError> {
        let inner = self.inner.read().await;
        let mut matches: Vec<_> = inner
            .connections
            .iter()
            .filter(|e| query.range.contains(e.timestamp))
            .filter(|e| event_matches_service(&e.source, &e.destination, &query.service))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matches.truncate(query.limit);
        Ok(matches)
    }

    async fn find_requests(&self, query: &EventQuery) -> Result<Vec<RequestEvent>, StorageError> {
        let inner = self.inner.read().await;
        let mut matches: Vec<_> = inner
            .requests
            .iter()
            .filter(|e| query.range.contains(e.timestamp))
            .filter(|e| event_matches_service(&e.source, &e.destination, &query.service))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matches.truncate(query.limit);
        Ok(matches)
    }

    async fn get_dependencies(&self, range: &TimeRange) -> Result<Vec<DependencyLink>, StorageError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<_> = inner
            .dependencies
            .iter()
            .filter(|link| range.contains(link.computed_at))
            .cloned()
            .collect();
        rows.truncate(10_000);
        Ok(rows)
    }

    async fn get_latencies(&self, query: &MetricQuery) -> Result<Vec<TimeSeriesPoint>, StorageError> {
        self.filtered_metric(MetricType::Latency, query).await
    }

    async fn get_call_rates(&self, query: &MetricQuery) -> Result<Vec<TimeSeriesPoint>, StorageError> {
        self.filtered_metric(MetricType::CallRate, query).await
    }

    async fn get_error_rates(&self, query: &MetricQuery) -> Result<Vec<TimeSeriesPoint>, StorageError> {
        self.filtered_metric(MetricType::ErrorRate, query).await
    }

    async fn list_services(&self) -> Result<BTreeSet<String>, StorageError> {
        let inner = self.inner.read().await;
        let mut services = BTreeSet::new();
        for c in &inner.connections {
            if let Some(s) = c.source.service_name() {
                services.insert(s.to_string());
            }
            if let Some(s) = c.destination.service_name() {
                services.insert(s.to_string());
            }
        }
        for r in &inner.requests {
            if let Some(s) = r.source.service_name() {
                services.insert(s.to_string());
            }
            if let Some(s) = r.destination.service_name() {
                services.insert(s.to_string());
            }
        }
        Ok(services)
    }

    async fn list_operations(&self, service: &str) -> Result<BTreeSet<String>, StorageError> {
        let inner = self.inner.read().await;
        let paths = inner
            .requests
            .iter()
            .filter(|r| r.bound_service() == Some(service))
            .map(|r| r.path.clone())
            .collect();
        Ok(paths)
    }
}

impl InMemoryStorage {
    async fn filtered_metric(
        &self,
        metric_type: MetricType,
        query: &MetricQuery,
    ) -> Result<Vec<TimeSeriesPoint>, StorageError> {
        let inner = self.inner.read().await;
        let mut points: Vec<_> = inner
            .metrics
            .get(&metric_type)
            .into_iter()
            .flatten()
            .filter(|p| query.range.contains(p.timestamp))
            .filter(|p| match &query.service {
                None => true,
                Some(want) => p.service() == Some(want.as_str()),
            })
            .cloned()
            .collect();
        points.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use nefi_core::Protocol;

    fn endpoint(ip: &str, service: &str) -> Endpoint {
        let mut e = Endpoint::new(ip, 80);
        e.service = Some(service.to_string());
        e
    }

    fn connection_at(ts: chrono::DateTime<Utc>, source_service: &str, dest_service: &str) -> ConnectionEvent {
        ConnectionEvent {
            timestamp: ts,
            node: "node-a".into(),
            source: endpoint("10.0.0.1", source_service),
            destination: endpoint("10.0.0.2", dest_service),
            bytes_sent: 1,
            bytes_recv: 1,
            duration_ns: 1,
            retransmits: 0,
            protocol: Protocol::Tcp,
        }
    }

    #[tokio::test]
    async fn find_connections_honours_time_range_and_service_filter() {
        let storage = InMemoryStorage::new();
        let now = Utc::now();
        storage
            .write_connections(&[
                connection_at(now - Duration::minutes(10), "web", "api"),
                connection_at(now, "web", "db"),
            ])
            .await
            .unwrap();

        let query = EventQuery::new(TimeRange::new(now - Duration::minutes(1), now + Duration::minutes(1)))
            .with_service("db");
        let found = storage.find_connections(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].destination.service_name(), Some("db"));
    }

    #[tokio::test]
    async fn find_connections_sorts_descending_by_timestamp() {
        let storage = InMemoryStorage::new();
        let now = Utc::now();
        storage
            .write_connections(&[
                connection_at(now - Duration::seconds(5), "web", "api"),
                connection_at(now, "web", "api"),
            ])
            .await
            .unwrap();
        let query = EventQuery::new(TimeRange::new(now - Duration::minutes(1), now + Duration::minutes(1)));
        let found = storage.find_connections(&query).await.unwrap();
        assert!(found[0].timestamp > found[1].timestamp);
    }

    fn dependency_link_at(computed_at: chrono::DateTime<Utc>) -> DependencyLink {
        DependencyLink {
            parent: "web".into(),
            child: "api".into(),
            call_count: 1,
            error_count: 0,
            p99_latency_ns: 1,
            computed_at,
        }
    }

    #[tokio::test]
    async fn get_dependencies_honours_time_range() {
        let storage = InMemoryStorage::new();
        let now = Utc::now();
        storage
            .write_dependencies(&[
                dependency_link_at(now - Duration::minutes(10)),
                dependency_link_at(now),
            ])
            .await
            .unwrap();

        let range = TimeRange::new(now - Duration::minutes(1), now + Duration::minutes(1));
        let found = storage.get_dependencies(&range).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].computed_at, now);
    }

    #[tokio::test]
    async fn list_services_collects_both_sides_of_every_event() {
        let storage = InMemoryStorage::new();
        let now = Utc::now();
        storage
            .write_connections(&[connection_at(now, "web", "api")])
            .await
            .unwrap();
        let services = storage.list_services().await.unwrap();
        assert!(services.contains("web"));
        assert!(services.contains("api"));
    }
}
