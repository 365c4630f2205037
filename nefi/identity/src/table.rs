//! The IP -> identity and (namespace, pod) -> service maps (spec §3, §4.2).
//!
//! Writes come only from the control-plane watch loops in [`crate::watch`],
//! serialized behind a single writer lock; `lookup` is the hot-path read
//! and never allocates on a miss, returning a value copy so callers cannot
//! observe a subsequent mutation.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use nefi_core::Endpoint;

#[derive(Default)]
struct Inner {
    by_ip: HashMap<String, Endpoint>,
    pod_service: HashMap<(String, String), String>,
    /// Reverse index so an EndpointSlice update/delete can find the IP rows
    /// that belong to a given pod without scanning `by_ip`.
    ips_by_pod: HashMap<(String, String), HashSet<String>>,
}

pub struct IdentityTable {
    inner: RwLock<Inner>,
}

impl Default for IdentityTable {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityTable {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// O(1) expected, lock-read-only, allocates nothing on a miss. Returns
    /// a copy, never a reference into the table.
    pub fn lookup(&self, ip: &str) -> Option<Endpoint> {
        self.inner.read().unwrap().by_ip.get(ip).cloned()
    }

    /// Records or replaces the pod behind `ip`, carrying over any
    /// already-known service association for that pod.
    pub fn upsert_pod_ip(&self, ip: &str, namespace: &str, pod: &str, workload: &str, workload_kind: &str, port: u16) {
        let mut inner = self.inner.write().unwrap();
        let service = inner
            .pod_service
            .get(&(namespace.to_string(), pod.to_string()))
            .cloned();
        inner.by_ip.insert(
            ip.to_string(),
            Endpoint {
                ip: ip.to_string(),
                port,
                pod: Some(pod.to_string()),
                namespace: Some(namespace.to_string()),
                workload: Some(workload.to_string()),
                workload_kind: Some(workload_kind.to_string()),
                service,
            },
        );
        inner
            .ips_by_pod
            .entry((namespace.to_string(), pod.to_string()))
            .or_default()
            .insert(ip.to_string());
    }

    pub fn remove_ip(&self, ip: &str) {
        let mut inner = self.inner.write().unwrap();
        if let Some(endpoint) = inner.by_ip.remove(ip) {
            if let (Some(ns), Some(pod)) = (endpoint.namespace, endpoint.pod) {
                if let Some(ips) = inner.ips_by_pod.get_mut(&(ns, pod)) {
                    ips.remove(ip);
                }
            }
        }
    }

    /// Associates `(namespace, pod)` with `service`, and stamps any
    /// already-present IP row for that pod with the service name
    /// (spec §4.2, "EndpointSlice handling").
    pub fn record_pod_service(&self, namespace: &str, pod: &str, service: &str) {
        let mut inner = self.inner.write().unwrap();
        let key = (namespace.to_string(), pod.to_string());
        inner.pod_service.insert(key.clone(), service.to_string());
        if let Some(ips) = inner.ips_by_pod.get(&key).cloned() {
            for ip in ips {
                if let Some(endpoint) = inner.by_ip.get_mut(&ip) {
                    endpoint.service = Some(service.to_string());
                }
            }
        }
    }

    /// Reverses `record_pod_service`: removes the association and clears
    /// the service field from any affected IP row (slice deletion).
    pub fn clear_pod_service(&self, namespace: &str, pod: &str) {
        let mut inner = self.inner.write().unwrap();
        let key = (namespace.to_string(), pod.to_string());
        inner.pod_service.remove(&key);
        if let Some(ips) = inner.ips_by_pod.get(&key).cloned() {
            for ip in ips {
                if let Some(endpoint) = inner.by_ip.get_mut(&ip) {
                    endpoint.service = None;
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().by_ip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_miss_returns_none() {
        let table = IdentityTable::new();
        assert_eq!(table.lookup("10.0.0.1"), None);
    }

    #[test]
    fn scenario_c_identity_enrichment() {
        let table = IdentityTable::new();
        table.upsert_pod_ip("10.0.0.5", "default", "p1", "frontend", "Deployment", 8080);
        table.record_pod_service("default", "p1", "frontend-svc");

        let endpoint = table.lookup("10.0.0.5").expect("endpoint present");
        assert_eq!(endpoint.pod.as_deref(), Some("p1"));
        assert_eq!(endpoint.workload.as_deref(), Some("frontend"));
        assert_eq!(endpoint.workload_kind.as_deref(), Some("Deployment"));
        assert_eq!(endpoint.service.as_deref(), Some("frontend-svc"));
    }

    #[test]
    fn slice_deletion_clears_service_but_keeps_the_ip_row() {
        let table = IdentityTable::new();
        table.upsert_pod_ip("10.0.0.5", "default", "p1", "frontend", "Deployment", 8080);
        table.record_pod_service("default", "p1", "frontend-svc");
        table.clear_pod_service("default", "p1");

        let endpoint = table.lookup("10.0.0.5").expect("endpoint present");
        assert_eq!(endpoint.service, None);
    }

    #[test]
    fn service_recorded_before_pod_ip_is_applied_on_upsert() {
        let table = IdentityTable::new();
        table.record_pod_service("default", "p1", "frontend-svc");
        table.upsert_pod_ip("10.0.0.5", "default", "p1", "frontend", "Deployment", 8080);
        let endpoint = table.lookup("10.0.0.5").unwrap();
        assert_eq!(endpoint.service.as_deref(), Some("frontend-svc"));
    }

    #[test]
    fn removing_an_ip_does_not_affect_other_ips_of_the_same_pod() {
        let table = IdentityTable::new();
        table.upsert_pod_ip("10.0.0.5", "default", "p1", "frontend", "Deployment", 8080);
        table.upsert_pod_ip("10.0.0.6", "default", "p1", "frontend", "Deployment", 8081);
        table.remove_ip("10.0.0.5");
        assert_eq!(table.lookup("10.0.0.5"), None);
        assert!(table.lookup("10.0.0.6").is_some());
    }
}
