//! The static attachment table (spec §4.1): which kernel hook each probe
//! program attaches to, and what kind of record it emits.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Tracepoint,
    Kprobe,
    Kretprobe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Connection,
    Request,
}

/// Ports read off a socket-read hook arrive network-ordered; ports read off
/// a tracepoint arrive already host-ordered (spec §4.1 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSource {
    Tracepoint,
    SocketRead,
}

#[derive(Debug, Clone, Copy)]
pub struct Attachment {
    pub program: &'static str,
    pub hook: HookKind,
    pub group: &'static str,
    pub symbol: &'static str,
    pub record_kind: RecordKind,
    pub port_source: PortSource,
}

/// The fixed program -> hook table. DNS-query capture via `udp_sendmsg` is
/// optional and attached best-effort like every other entry.
pub const ATTACHMENTS: &[Attachment] = &[
    Attachment {
        program: "connection_lifecycle",
        hook: HookKind::Tracepoint,
        group: "sock",
        symbol: "inet_sock_set_state",
        record_kind: RecordKind::Connection,
        port_source: PortSource::Tracepoint,
    },
    Attachment {
        program: "tcp_retransmit",
        hook: HookKind::Tracepoint,
        group: "tcp",
        symbol: "tcp_retransmit_skb",
        record_kind: RecordKind::Connection,
        port_source: PortSource::Tracepoint,
    },
    Attachment {
        program: "http_send",
        hook: HookKind::Kprobe,
        group: "kprobe",
        symbol: "tcp_sendmsg",
        record_kind: RecordKind::Request,
        port_source: PortSource::SocketRead,
    },
    Attachment {
        program: "http_recv_entry",
        hook: HookKind::Kprobe,
        group: "kprobe",
        symbol: "tcp_recvmsg",
        record_kind: RecordKind::Request,
        port_source: PortSource::SocketRead,
    },
    Attachment {
        program: "http_recv_exit",
        hook: HookKind::Kretprobe,
        group: "kretprobe",
        symbol: "tcp_recvmsg",
        record_kind: RecordKind::Request,
        port_source: PortSource::SocketRead,
    },
    Attachment {
        program: "dns_query",
        hook: HookKind::Kprobe,
        group: "kprobe",
        symbol: "udp_sendmsg",
        record_kind: RecordKind::Connection,
        port_source: PortSource::SocketRead,
    },
];
