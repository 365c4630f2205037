use std::collections::HashMap;

use chrono::{DateTime, Utc};
use nefi_core::{ConnectionEvent, DependencyLink, RequestEvent};

#[derive(Default)]
struct EdgeAccumulator {
    call_count: u64,
    error_count: u64,
    samples: Vec<u64>,
}

/// Accumulates connection and request events into per-`(parent, child)`
/// service-pair edges (spec §4.6). Self-edges and events missing either
/// side's service are silently dropped.
#[derive(Default)]
pub struct EdgeAccumulatorMap {
    edges: HashMap<(String, String), EdgeAccumulator>,
}

impl EdgeAccumulatorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_connection(&mut self, event: &ConnectionEvent) {
        let Some((parent, child)) = directed_pair(event.source.service_name(), event.destination.service_name())
        else {
            return;
        };
        let edge = self.edges.entry((parent, child)).or_default();
        edge.call_count += 1;
        if event.duration_ns > 0 {
            edge.samples.push(event.duration_ns);
        }
    }

    pub fn add_request(&mut self, event: &RequestEvent) {
        let Some((parent, child)) = directed_pair(event.source.service_name(), event.destination.service_name())
        else {
            return;
        };
        let edge = self.edges.entry((parent, child)).or_default();
        edge.call_count += 1;
        if event.is_error() {
            edge.error_count += 1;
        }
        if event.latency_ns > 0 {
            edge.samples.push(event.latency_ns);
        }
    }

    /// Materialises one `DependencyLink` row per accumulated edge, computing
    /// P99 by exact sort of that edge's latency samples. `computed_at` is
    /// stamped on every row for later time-range filtering.
    pub fn into_links(self, computed_at: DateTime<Utc>) -> Vec<DependencyLink> {
        self.edges
            .into_iter()
            .map(|((parent, child), edge)| DependencyLink {
                parent,
                child,
                call_count: edge.call_count,
                error_count: edge.error_count,
                p99_latency_ns: exact_p99(edge.samples),
                computed_at,
            })
            .collect()
    }
}

fn directed_pair(source: Option<&str>, destination: Option<&str>) -> Option<(String, String)> {
    let source = source.filter(|s| !s.is_empty())?;
    let destination = destination.filter(|d| !d.is_empty())?;
    if source == destination {
        return None;
    }
    Some((source.to_string(), destination.to_string()))
}

/// `idx = ceil(0.99 * n) - 1`, clamped to `[0, n-1]`; empty input yields 0.
fn exact_p99(mut samples: Vec<u64>) -> u64 {
    if samples.is_empty() {
        return 0;
    }
    samples.sort_unstable();
    let n = samples.len();
    let idx = ((0.99 * n as f64).ceil() as usize).saturating_sub(1).min(n - 1);
    samples[idx]
}

#[cfg(test)]
mod tests {
    use super::*;
    use nefi_core::{Endpoint, HttpMethod, Protocol};

    fn endpoint(service: &str) -> Endpoint {
        let mut e = Endpoint::new("10.0.0.1", 80);
        e.service = Some(service.to_string());
        e
    }

    fn request(source: &str, destination: &str, latency_ns: u64, status_code: u16) -> RequestEvent {
        RequestEvent {
            timestamp: chrono::Utc::now(),
            node: "node-a".into(),
            source: endpoint(source),
            destination: endpoint(destination),
            method: HttpMethod::Get,
            path: "/".into(),
            status_code,
            latency_ns,
            protocol: Protocol::Tcp,
        }
    }

    #[test]
    fn scenario_d_self_edge_suppression() {
        let mut edges = EdgeAccumulatorMap::new();
        for _ in 0..100 {
            edges.add_request(&request("web", "web", 1_000_000, 200));
        }
        assert!(edges.into_links(chrono::Utc::now()).is_empty());
    }

    #[test]
    fn scenario_e_dependency_p99() {
        let mut edges = EdgeAccumulatorMap::new();
        for latency in 1..=100u64 {
            edges.add_request(&request("a", "b", latency, 200));
        }
        let links = edges.into_links(chrono::Utc::now());
        assert_eq!(links.len(), 1);
        let link = &links[0];
        assert_eq!(link.parent, "a");
        assert_eq!(link.child, "b");
        assert_eq!(link.call_count, 100);
        assert_eq!(link.error_count, 0);
        assert_eq!(link.p99_latency_ns, 99);
    }

    #[test]
    fn empty_edge_has_zero_p99() {
        assert_eq!(exact_p99(Vec::new()), 0);
    }

    #[test]
    fn missing_service_on_either_side_drops_the_event() {
        let mut edges = EdgeAccumulatorMap::new();
        edges.add_request(&request("", "b", 1_000_000, 200));
        edges.add_request(&request("a", "", 1_000_000, 200));
        assert!(edges.into_links(chrono::Utc::now()).is_empty());
    }
}
