//! Byte-for-byte decode of the probe-emitted record layouts (spec §6).
//!
//! Both layouts are little-endian and packed; offsets are derived from the
//! preceding field widths rather than hard-coded so that reordering a field
//! list here cannot silently desynchronize parsing from the declared size.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use std::net::Ipv4Addr;

use nefi_core::Error;

macro_rules! field_offsets {
    ($($name:ident : $size:expr),+ $(,)?) => {
        field_offsets!(@acc 0usize; $($name : $size),+);
    };
    (@acc $offset:expr; $name:ident : $size:expr, $($rest:ident : $rsize:expr),+) => {
        pub const $name: usize = $offset;
        field_offsets!(@acc $offset + $size; $($rest : $rsize),+);
    };
    (@acc $offset:expr; $name:ident : $size:expr) => {
        pub const $name: usize = $offset;
        pub const RECORD_LEN: usize = $offset + $size;
    };
}

/// Field offsets and total length of the connection record (§6).
pub mod connection_layout {
    field_offsets! {
        TIMESTAMP_NS: 8,
        SRC_IP: 4,
        DST_IP: 4,
        SRC_PORT: 2,
        DST_PORT: 2,
        BYTES_SENT: 8,
        BYTES_RECV: 8,
        DURATION_NS: 8,
        RETRANSMITS: 4,
        PROTOCOL: 1,
    }
}

/// Field offsets and total length of the request record (§6). `PATH` is a
/// fixed 128-byte NUL-terminated field; the declared max content length is
/// 127 bytes.
pub mod request_layout {
    pub const PATH_FIELD_LEN: usize = 128;
    pub const MAX_PATH_LEN: usize = PATH_FIELD_LEN - 1;

    field_offsets! {
        TIMESTAMP_NS: 8,
        SRC_IP: 4,
        DST_IP: 4,
        SRC_PORT: 2,
        DST_PORT: 2,
        METHOD: 1,
        STATUS_CODE: 2,
        LATENCY_NS: 8,
        PATH: 128,
    }
}

const _: () = assert!(connection_layout::RECORD_LEN == 49);
const _: () = assert!(request_layout::RECORD_LEN == 159);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawConnectionRecord {
    pub timestamp_ns: u64,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    /// As read off the wire, pre-normalization (§4.1 step 4).
    pub src_port_raw: u16,
    pub dst_port_raw: u16,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub duration_ns: u64,
    pub retransmits: u32,
    pub protocol_raw: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequestRecord {
    pub timestamp_ns: u64,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port_raw: u16,
    pub dst_port_raw: u16,
    pub method_raw: u8,
    pub status_code: u16,
    pub latency_ns: u64,
    pub path: String,
}

fn read_ipv4(buf: &[u8], offset: usize) -> Ipv4Addr {
    Ipv4Addr::new(buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3])
}

/// Parses a connection record. Returns `Err` if `buf` is shorter than the
/// declared struct size; any trailing padding bytes are ignored.
pub fn decode_connection_record(buf: &[u8]) -> Result<RawConnectionRecord, Error> {
    use connection_layout::*;
    if buf.len() < RECORD_LEN {
        return Err(Error::RecordTooShort {
            got: buf.len(),
            need: RECORD_LEN,
        });
    }
    let mut cursor = Cursor::new(&buf[TIMESTAMP_NS..]);
    let timestamp_ns = cursor
        .read_u64::<LittleEndian>()
        .map_err(|e| Error::Decode(e.to_string()))?;
    let src_ip = read_ipv4(buf, SRC_IP);
    let dst_ip = read_ipv4(buf, DST_IP);
    let src_port_raw = u16::from_le_bytes([buf[SRC_PORT], buf[SRC_PORT + 1]]);
    let dst_port_raw = u16::from_le_bytes([buf[DST_PORT], buf[DST_PORT + 1]]);
    let bytes_sent = u64::from_le_bytes(buf[BYTES_SENT..BYTES_SENT + 8].try_into().unwrap());
    let bytes_recv = u64::from_le_bytes(buf[BYTES_RECV..BYTES_RECV + 8].try_into().unwrap());
    let duration_ns = u64::from_le_bytes(buf[DURATION_NS..DURATION_NS + 8].try_into().unwrap());
    let retransmits = u32::from_le_bytes(buf[RETRANSMITS..RETRANSMITS + 4].try_into().unwrap());
    let protocol_raw = buf[PROTOCOL];

    Ok(RawConnectionRecord {
        timestamp_ns,
        src_ip,
        dst_ip,
        src_port_raw,
        dst_port_raw,
        bytes_sent,
        bytes_recv,
        duration_ns,
        retransmits,
        protocol_raw,
    })
}

/// Parses a request record, trimming `path` at its first NUL byte.
pub fn decode_request_record(buf: &[u8]) -> Result<RawRequestRecord, Error> {
    use request_layout::*;
    if buf.len() < RECORD_LEN {
        return Err(Error::RecordTooShort {
            got: buf.len(),
            need: RECORD_LEN,
        });
    }
    let timestamp_ns = u64::from_le_bytes(buf[TIMESTAMP_NS..TIMESTAMP_NS + 8].try_into().unwrap());
    let src_ip = read_ipv4(buf, SRC_IP);
    let dst_ip = read_ipv4(buf, DST_IP);
    let src_port_raw = u16::from_le_bytes([buf[SRC_PORT], buf[SRC_PORT + 1]]);
    let dst_port_raw = u16::from_le_bytes([buf[DST_PORT], buf[DST_PORT + 1]]);
    let method_raw = buf[METHOD];
    let status_code = u16::from_le_bytes([buf[STATUS_CODE], buf[STATUS_CODE + 1]]);
    let latency_ns = u64::from_le_bytes(buf[LATENCY_NS..LATENCY_NS + 8].try_into().unwrap());

    let path_bytes = &buf[PATH..PATH + PATH_FIELD_LEN];
    let nul_at = path_bytes.iter().position(|&b| b == 0).unwrap_or(path_bytes.len());
    let path = String::from_utf8_lossy(&path_bytes[..nul_at]).into_owned();

    Ok(RawRequestRecord {
        timestamp_ns,
        src_ip,
        dst_ip,
        src_port_raw,
        dst_port_raw,
        method_raw,
        status_code,
        latency_ns,
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_connection_bytes() -> Vec<u8> {
        let mut buf = vec![0u8; connection_layout::RECORD_LEN + 3];
        buf[0..8].copy_from_slice(&42u64.to_le_bytes());
        buf[8..12].copy_from_slice(&[10, 0, 0, 1]);
        buf[12..16].copy_from_slice(&[10, 0, 0, 2]);
        buf[16..18].copy_from_slice(&1234u16.to_le_bytes());
        buf[18..20].copy_from_slice(&80u16.to_le_bytes());
        buf[20..28].copy_from_slice(&100u64.to_le_bytes());
        buf[28..36].copy_from_slice(&200u64.to_le_bytes());
        buf[36..44].copy_from_slice(&5_000_000u64.to_le_bytes());
        buf[44..48].copy_from_slice(&1u32.to_le_bytes());
        buf[48] = 1;
        buf
    }

    #[test]
    fn decodes_connection_record_ignoring_padding() {
        let buf = sample_connection_bytes();
        let rec = decode_connection_record(&buf).unwrap();
        assert_eq!(rec.timestamp_ns, 42);
        assert_eq!(rec.src_ip, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(rec.dst_ip, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(rec.src_port_raw, 1234);
        assert_eq!(rec.dst_port_raw, 80);
        assert_eq!(rec.bytes_sent, 100);
        assert_eq!(rec.bytes_recv, 200);
        assert_eq!(rec.duration_ns, 5_000_000);
        assert_eq!(rec.retransmits, 1);
        assert_eq!(rec.protocol_raw, 1);
    }

    #[test]
    fn rejects_short_connection_record() {
        let buf = vec![0u8; connection_layout::RECORD_LEN - 1];
        assert!(decode_connection_record(&buf).is_err());
    }

    #[test]
    fn decodes_request_record_path_up_to_nul() {
        let mut buf = vec![0u8; request_layout::RECORD_LEN];
        buf[0..8].copy_from_slice(&7u64.to_le_bytes());
        buf[8..12].copy_from_slice(&[10, 0, 0, 5]);
        buf[12..16].copy_from_slice(&[10, 0, 0, 6]);
        buf[16..18].copy_from_slice(&5555u16.to_le_bytes());
        buf[18..20].copy_from_slice(&8080u16.to_le_bytes());
        buf[20] = 1; // GET
        buf[21..23].copy_from_slice(&200u16.to_le_bytes());
        buf[23..31].copy_from_slice(&10_000_000u64.to_le_bytes());
        let path = b"/healthz";
        buf[31..31 + path.len()].copy_from_slice(path);
        let rec = decode_request_record(&buf).unwrap();
        assert_eq!(rec.path, "/healthz");
        assert_eq!(rec.method_raw, 1);
        assert_eq!(rec.status_code, 200);
        assert_eq!(rec.latency_ns, 10_000_000);
    }

    #[test]
    fn rejects_short_request_record() {
        let buf = vec![0u8; request_layout::RECORD_LEN - 1];
        assert!(decode_request_record(&buf).is_err());
    }
}
