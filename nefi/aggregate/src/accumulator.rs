use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use nefi_core::{ConnectionEvent, Event, Histogram, RequestEvent};

type Accumulators = HashMap<String, Arc<Mutex<Histogram>>>;

/// A per-service histogram map with a lock-free reader path and an atomic
/// per-flush handoff (spec §9, "Aggregator snapshot"): observers never
/// block on the flush's compute-and-write phase, which runs entirely on the
/// swapped-out copy.
#[derive(Default)]
pub struct AccumulatorMap {
    current: ArcSwap<Accumulators>,
}

impl AccumulatorMap {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Applies one event's observation rules (spec §4.5). Events bound to
    /// no service (both sides unidentified) are silently dropped.
    pub fn observe(&self, event: &Event) {
        match event {
            Event::Connection(c) => self.observe_connection(c),
            Event::Request(r) => self.observe_request(r),
        }
    }

    fn observe_connection(&self, event: &ConnectionEvent) {
        let Some(service) = event.bound_service() else {
            return;
        };
        self.with_histogram(service, |h| {
            h.call_count += 1;
            h.bytes_sent += event.bytes_sent;
            h.bytes_recv += event.bytes_recv;
            if event.duration_ns > 0 {
                h.observe_latency(event.duration_ns);
            }
            h.last_observed = Some(event.timestamp);
        });
    }

    fn observe_request(&self, event: &RequestEvent) {
        let Some(service) = event.bound_service() else {
            return;
        };
        self.with_histogram(service, |h| {
            h.call_count += 1;
            if event.is_error() {
                h.error_count += 1;
            }
            if event.latency_ns > 0 {
                h.observe_latency(event.latency_ns);
            }
            h.last_observed = Some(event.timestamp);
        });
    }

    fn with_histogram(&self, service: &str, f: impl FnOnce(&mut Histogram)) {
        let map = self.current.load();
        if let Some(hist) = map.get(service) {
            f(&mut hist.lock().unwrap());
            return;
        }
        drop(map);
        self.current.rcu(|old| {
            let mut next = (**old).clone();
            next.entry(service.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Histogram::new())));
            next
        });
        let map = self.current.load();
        f(&mut map.get(service).unwrap().lock().unwrap());
    }

    /// Swaps in a fresh, empty map and returns owned histograms from the
    /// old one. Tumbling-window semantics: the next observation for a
    /// service recreates its entry from zero.
    pub fn swap_out(&self) -> HashMap<String, Histogram> {
        let old = self.current.swap(Arc::new(HashMap::new()));
        old.iter()
            .map(|(service, hist)| (service.clone(), hist.lock().unwrap().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nefi_core::{Endpoint, Protocol};

    fn endpoint(service: &str) -> Endpoint {
        let mut e = Endpoint::new("10.0.0.1", 80);
        e.service = Some(service.to_string());
        e
    }

    fn connection(source_service: &str, dest_service: &str, duration_ns: u64) -> Event {
        Event::Connection(ConnectionEvent {
            timestamp: chrono::Utc::now(),
            node: "node-a".into(),
            source: endpoint(source_service),
            destination: endpoint(dest_service),
            bytes_sent: 100,
            bytes_recv: 200,
            duration_ns,
            retransmits: 0,
            protocol: Protocol::Tcp,
        })
    }

    #[test]
    fn unbound_event_is_dropped() {
        let acc = AccumulatorMap::new();
        acc.observe(&connection("", "", 1_000_000));
        assert!(acc.swap_out().is_empty());
    }

    #[test]
    fn observation_accumulates_under_source_service_first() {
        let acc = AccumulatorMap::new();
        acc.observe(&connection("web", "api", 1_000_000));
        let snapshot = acc.swap_out();
        assert_eq!(snapshot["web"].call_count, 1);
        assert!(!snapshot.contains_key("api"));
    }

    #[test]
    fn swap_out_resets_to_empty_for_tumbling_windows() {
        let acc = AccumulatorMap::new();
        acc.observe(&connection("web", "api", 1_000_000));
        let first = acc.swap_out();
        assert_eq!(first["web"].call_count, 1);
        let second = acc.swap_out();
        assert!(second.is_empty());
    }

    #[test]
    fn zero_duration_connection_is_not_observed_as_latency() {
        let acc = AccumulatorMap::new();
        acc.observe(&connection("web", "api", 0));
        let snapshot = acc.swap_out();
        assert_eq!(snapshot["web"].total_observations(), 0);
        assert_eq!(snapshot["web"].call_count, 1);
    }
}
