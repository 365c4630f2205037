//! Conversions between the generated protobuf types and `nefi_core`'s
//! domain model, used by the export client (encode) and the ingestion
//! server (decode).

use nefi_core::{ConnectionEvent, Endpoint, Event, HttpMethod, Protocol, RequestEvent};

use crate::proto;

impl From<&Endpoint> for proto::Endpoint {
    fn from(e: &Endpoint) -> Self {
        proto::Endpoint {
            ip: e.ip.clone(),
            port: e.port as u32,
            pod: e.pod.clone(),
            namespace: e.namespace.clone(),
            workload: e.workload.clone(),
            workload_kind: e.workload_kind.clone(),
            service: e.service.clone(),
        }
    }
}

impl From<proto::Endpoint> for Endpoint {
    fn from(e: proto::Endpoint) -> Self {
        Endpoint {
            ip: e.ip,
            port: e.port as u16,
            pod: e.pod,
            namespace: e.namespace,
            workload: e.workload,
            workload_kind: e.workload_kind,
            service: e.service,
        }
    }
}

impl From<Protocol> for proto::Protocol {
    fn from(p: Protocol) -> Self {
        match p {
            Protocol::Tcp => proto::Protocol::Tcp,
            Protocol::Udp => proto::Protocol::Udp,
        }
    }
}

impl From<proto::Protocol> for Protocol {
    fn from(p: proto::Protocol) -> Self {
        match p {
            proto::Protocol::Tcp => Protocol::Tcp,
            proto::Protocol::Udp | proto::Protocol::Unspecified => Protocol::Udp,
        }
    }
}

impl From<HttpMethod> for proto::HttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Unknown => proto::HttpMethod::Unknown,
            HttpMethod::Get => proto::HttpMethod::Get,
            HttpMethod::Post => proto::HttpMethod::Post,
            HttpMethod::Put => proto::HttpMethod::Put,
            HttpMethod::Delete => proto::HttpMethod::Delete,
            HttpMethod::Patch => proto::HttpMethod::Patch,
            HttpMethod::Head => proto::HttpMethod::Head,
            HttpMethod::Options => proto::HttpMethod::Options,
        }
    }
}

impl From<proto::HttpMethod> for HttpMethod {
    fn from(m: proto::HttpMethod) -> Self {
        match m {
            proto::HttpMethod::Unknown => HttpMethod::Unknown,
            proto::HttpMethod::Get => HttpMethod::Get,
            proto::HttpMethod::Post => HttpMethod::Post,
            proto::HttpMethod::Put => HttpMethod::Put,
            proto::HttpMethod::Delete => HttpMethod::Delete,
            proto::HttpMethod::Patch => HttpMethod::Patch,
            proto::HttpMethod::Head => HttpMethod::Head,
            proto::HttpMethod::Options => HttpMethod::Options,
        }
    }
}

impl From<&ConnectionEvent> for proto::ConnectionRecord {
    fn from(e: &ConnectionEvent) -> Self {
        proto::ConnectionRecord {
            timestamp_ns: e.timestamp.timestamp_nanos_opt().unwrap_or_default(),
            node: e.node.clone(),
            source: Some((&e.source).into()),
            destination: Some((&e.destination).into()),
            bytes_sent: e.bytes_sent,
            bytes_recv: e.bytes_recv,
            duration_ns: e.duration_ns,
            retransmits: e.retransmits,
            protocol: proto::Protocol::from(e.protocol) as i32,
        }
    }
}

impl From<&RequestEvent> for proto::RequestRecord {
    fn from(e: &RequestEvent) -> Self {
        proto::RequestRecord {
            timestamp_ns: e.timestamp.timestamp_nanos_opt().unwrap_or_default(),
            node: e.node.clone(),
            source: Some((&e.source).into()),
            destination: Some((&e.destination).into()),
            method: proto::HttpMethod::from(e.method) as i32,
            path: e.path.clone(),
            status_code: e.status_code as u32,
            latency_ns: e.latency_ns,
            protocol: proto::Protocol::from(e.protocol) as i32,
        }
    }
}

/// Decodes one wire record, defaulting a blank per-event `node` to
/// `batch_node` (§4.4).
pub fn connection_from_proto(r: proto::ConnectionRecord, batch_node: &str) -> ConnectionEvent {
    let node = if r.node.is_empty() { batch_node.to_string() } else { r.node };
    ConnectionEvent {
        timestamp: chrono::DateTime::from_timestamp_nanos(r.timestamp_ns),
        node,
        source: r.source.map(Endpoint::from).unwrap_or_default(),
        destination: r.destination.map(Endpoint::from).unwrap_or_default(),
        bytes_sent: r.bytes_sent,
        bytes_recv: r.bytes_recv,
        duration_ns: r.duration_ns,
        retransmits: r.retransmits,
        protocol: proto::Protocol::try_from(r.protocol)
            .map(Protocol::from)
            .unwrap_or(Protocol::Tcp),
    }
}

pub fn request_from_proto(r: proto::RequestRecord, batch_node: &str) -> RequestEvent {
    let node = if r.node.is_empty() { batch_node.to_string() } else { r.node };
    RequestEvent {
        timestamp: chrono::DateTime::from_timestamp_nanos(r.timestamp_ns),
        node,
        source: r.source.map(Endpoint::from).unwrap_or_default(),
        destination: r.destination.map(Endpoint::from).unwrap_or_default(),
        method: proto::HttpMethod::try_from(r.method)
            .map(HttpMethod::from)
            .unwrap_or(HttpMethod::Unknown),
        path: r.path,
        status_code: r.status_code as u16,
        latency_ns: r.latency_ns,
        protocol: proto::Protocol::try_from(r.protocol)
            .map(Protocol::from)
            .unwrap_or(Protocol::Tcp),
    }
}

/// Builds the batch envelope for one flush (§4.3 step 2): partitions a
/// slice of tagged events into per-kind lists under a single node.
pub fn build_batch(node: &str, events: &[Event]) -> proto::Batch {
    let mut batch = proto::Batch {
        node: node.to_string(),
        connections: Vec::new(),
        requests: Vec::new(),
    };
    for event in events {
        match event {
            Event::Connection(c) => batch.connections.push(c.into()),
            Event::Request(r) => batch.requests.push(r.into()),
        }
    }
    batch
}

/// Decodes a batch back into tagged domain events, in wire order.
pub fn decode_batch(batch: proto::Batch) -> Vec<Event> {
    let node = batch.node;
    let mut events = Vec::with_capacity(batch.connections.len() + batch.requests.len());
    events.extend(
        batch
            .connections
            .into_iter()
            .map(|r| Event::Connection(connection_from_proto(r, &node))),
    );
    events.extend(
        batch
            .requests
            .into_iter()
            .map(|r| Event::Request(request_from_proto(r, &node))),
    );
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use nefi_core::Endpoint;

    #[test]
    fn connection_event_roundtrips_through_the_wire_format() {
        let event = ConnectionEvent {
            timestamp: chrono::DateTime::from_timestamp_nanos(1_700_000_000_000_000_000),
            node: "node-a".to_string(),
            source: Endpoint::new("10.0.0.1", 1234),
            destination: Endpoint::new("10.0.0.2", 80),
            bytes_sent: 100,
            bytes_recv: 200,
            duration_ns: 5_000_000,
            retransmits: 0,
            protocol: Protocol::Tcp,
        };
        let record: proto::ConnectionRecord = (&event).into();
        let decoded = connection_from_proto(record, "node-a");
        assert_eq!(decoded, event);
    }

    #[test]
    fn blank_record_node_defaults_from_batch_envelope() {
        let event = ConnectionEvent {
            timestamp: chrono::DateTime::from_timestamp_nanos(0),
            node: String::new(),
            source: Endpoint::new("10.0.0.1", 1234),
            destination: Endpoint::new("10.0.0.2", 80),
            bytes_sent: 0,
            bytes_recv: 0,
            duration_ns: 0,
            retransmits: 0,
            protocol: Protocol::Tcp,
        };
        let batch = build_batch("node-b", &[Event::Connection(event)]);
        let decoded = decode_batch(batch);
        match &decoded[0] {
            Event::Connection(c) => assert_eq!(c.node, "node-b"),
            _ => panic!("expected connection event"),
        }
    }
}
