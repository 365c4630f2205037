use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A directed service->service edge, aggregated over a trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyLink {
    pub parent: String,
    pub child: String,
    pub call_count: u64,
    pub error_count: u64,
    pub p99_latency_ns: u64,
    /// When this row was materialised by the dependency computer; storage
    /// readers filter on this to honour time-range queries (spec §4.7).
    pub computed_at: DateTime<Utc>,
}
