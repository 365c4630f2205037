use std::time::Duration;

/// Export client configuration; defaults match spec §4.3.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub node: String,
    pub server_addr: String,
    pub queue_bound: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub dial_timeout: Duration,
}

impl ExportConfig {
    pub fn new(node: impl Into<String>, server_addr: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            server_addr: server_addr.into(),
            queue_bound: 10_000,
            batch_size: 100,
            flush_interval: Duration::from_millis(100),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            dial_timeout: Duration::from_secs(5),
        }
    }
}
