//! Pure record -> event decoding (spec §4.1 steps 2-5). Independent of
//! `aya` so it is unit-testable without a kernel.

use nefi_core::{ConnectionEvent, Endpoint, Event, HttpMethod, Protocol, RequestEvent};
use nefi_wire::kernel::{decode_connection_record, decode_request_record};

use crate::attachment::PortSource;
use crate::error::ProbeError;

/// Ports read off a tracepoint arrive already host-ordered; ports read off
/// a raw socket read arrive network-ordered and must be byte-swapped.
fn normalize_port(raw: u16, source: PortSource) -> u16 {
    match source {
        PortSource::Tracepoint => raw,
        PortSource::SocketRead => raw.swap_bytes(),
    }
}

fn protocol_from_byte(b: u8) -> Protocol {
    match b {
        1 => Protocol::Udp,
        _ => Protocol::Tcp,
    }
}

/// Decodes a connection record into a domain event. `node` is filled in by
/// the caller (the loader knows which node it runs on); it starts blank so
/// the export client or ingestion server can default it from the envelope.
pub fn decode_connection(buf: &[u8], port_source: PortSource) -> Result<ConnectionEvent, ProbeError> {
    let raw = decode_connection_record(buf)?;
    let src_port = normalize_port(raw.src_port_raw, port_source);
    let dst_port = normalize_port(raw.dst_port_raw, port_source);
    Ok(ConnectionEvent {
        timestamp: chrono::DateTime::from_timestamp_nanos(raw.timestamp_ns as i64),
        node: String::new(),
        source: Endpoint::new(raw.src_ip.to_string(), src_port),
        destination: Endpoint::new(raw.dst_ip.to_string(), dst_port),
        bytes_sent: raw.bytes_sent,
        bytes_recv: raw.bytes_recv,
        duration_ns: raw.duration_ns,
        retransmits: raw.retransmits,
        protocol: protocol_from_byte(raw.protocol_raw),
    })
}

pub fn decode_request(buf: &[u8], port_source: PortSource) -> Result<RequestEvent, ProbeError> {
    let raw = decode_request_record(buf)?;
    let src_port = normalize_port(raw.src_port_raw, port_source);
    let dst_port = normalize_port(raw.dst_port_raw, port_source);
    Ok(RequestEvent {
        timestamp: chrono::DateTime::from_timestamp_nanos(raw.timestamp_ns as i64),
        node: String::new(),
        source: Endpoint::new(raw.src_ip.to_string(), src_port),
        destination: Endpoint::new(raw.dst_ip.to_string(), dst_port),
        method: HttpMethod::from_probe_byte(raw.method_raw),
        path: raw.path,
        status_code: raw.status_code,
        latency_ns: raw.latency_ns,
        protocol: Protocol::Tcp,
    })
}

/// Decodes a record of the given kind, tagging the result (spec §9,
/// "Event-kind dispatch": never erase the tag).
pub fn decode_tagged(
    buf: &[u8],
    record_kind: crate::attachment::RecordKind,
    port_source: PortSource,
) -> Result<Event, ProbeError> {
    use crate::attachment::RecordKind;
    match record_kind {
        RecordKind::Connection => decode_connection(buf, port_source).map(Event::Connection),
        RecordKind::Request => decode_request(buf, port_source).map(Event::Request),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection_bytes(src_port: u16, dst_port: u16) -> Vec<u8> {
        let mut buf = vec![0u8; nefi_wire::kernel::connection_layout::RECORD_LEN];
        buf[0..8].copy_from_slice(&1u64.to_le_bytes());
        buf[8..12].copy_from_slice(&[10, 0, 0, 1]);
        buf[12..16].copy_from_slice(&[10, 0, 0, 2]);
        buf[16..18].copy_from_slice(&src_port.to_le_bytes());
        buf[18..20].copy_from_slice(&dst_port.to_le_bytes());
        buf
    }

    #[test]
    fn tracepoint_ports_pass_through_unswapped() {
        let buf = connection_bytes(1234, 80);
        let event = decode_connection(&buf, PortSource::Tracepoint).unwrap();
        assert_eq!(event.source.port, 1234);
        assert_eq!(event.destination.port, 80);
    }

    #[test]
    fn socket_read_ports_are_byte_swapped_to_host_order() {
        // 80 in network order, as it would sit in a raw 2-byte LE field.
        let network_order_80 = 80u16.swap_bytes();
        let buf = connection_bytes(1234, network_order_80);
        let event = decode_connection(&buf, PortSource::SocketRead).unwrap();
        assert_eq!(event.destination.port, 80);
    }

    #[test]
    fn short_record_is_rejected_as_decode_error() {
        let buf = vec![0u8; 10];
        assert!(decode_connection(&buf, PortSource::Tracepoint).is_err());
    }
}
