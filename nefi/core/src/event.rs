use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Unknown,
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    /// Maps the `method` byte emitted by the request-record probe (§6).
    pub fn from_probe_byte(b: u8) -> Self {
        match b {
            1 => HttpMethod::Get,
            2 => HttpMethod::Post,
            3 => HttpMethod::Put,
            4 => HttpMethod::Delete,
            5 => HttpMethod::Patch,
            6 => HttpMethod::Head,
            7 => HttpMethod::Options,
            _ => HttpMethod::Unknown,
        }
    }
}

/// One completed L4 flow, emitted by the probe on connection close.
///
/// Never mutated after construction; freed once it leaves the export queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub node: String,
    pub source: Endpoint,
    pub destination: Endpoint,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub duration_ns: u64,
    pub retransmits: u32,
    pub protocol: Protocol,
}

impl ConnectionEvent {
    /// The service this observation is bound to for aggregation purposes:
    /// `source.service` if present, else `destination.service`.
    pub fn bound_service(&self) -> Option<&str> {
        self.source
            .service_name()
            .or_else(|| self.destination.service_name())
    }
}

/// One L7 HTTP/gRPC exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEvent {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub node: String,
    pub source: Endpoint,
    pub destination: Endpoint,
    pub method: HttpMethod,
    pub path: String,
    pub status_code: u16,
    pub latency_ns: u64,
    pub protocol: Protocol,
}

impl RequestEvent {
    pub fn bound_service(&self) -> Option<&str> {
        self.destination
            .service_name()
            .or_else(|| self.source.service_name())
    }

    pub fn is_error(&self) -> bool {
        self.status_code >= 500
    }
}

/// A tagged union over the two event kinds, used wherever a single channel
/// or queue must preserve which kind an observation was without erasing it
/// (downstream needs the tag for metric classification).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Connection(ConnectionEvent),
    Request(RequestEvent),
}

impl Event {
    pub fn node(&self) -> &str {
        match self {
            Event::Connection(e) => &e.node,
            Event::Request(e) => &e.node,
        }
    }

    /// Defaults a blank per-event `node` to the batch-level node, as the
    /// ingestion server does for each decoded event (§4.4).
    pub fn with_default_node(mut self, node: &str) -> Self {
        match &mut self {
            Event::Connection(e) if e.node.is_empty() => e.node = node.to_string(),
            Event::Request(e) if e.node.is_empty() => e.node = node.to_string(),
            _ => {}
        }
        self
    }

    pub fn timestamp(&self) -> chrono::DateTime<chrono::Utc> {
        match self {
            Event::Connection(e) => e.timestamp,
            Event::Request(e) => e.timestamp,
        }
    }
}
