use chrono::{DateTime, Utc};

/// An inclusive `[from, to]` timestamp window.
#[derive(Debug, Clone, Copy)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.from && ts <= self.to
    }
}

/// A query over connection/request events. Service matches are OR'd across
/// source and destination (spec §6, "Storage adapter time-range encoding").
#[derive(Debug, Clone)]
pub struct EventQuery {
    pub range: TimeRange,
    pub service: Option<String>,
    pub limit: usize,
}

impl EventQuery {
    pub fn new(range: TimeRange) -> Self {
        Self {
            range,
            service: None,
            limit: 100,
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// A query over time-series metric points (latency/call-rate/error-rate/traffic).
#[derive(Debug, Clone)]
pub struct MetricQuery {
    pub range: TimeRange,
    pub service: Option<String>,
}

impl MetricQuery {
    pub fn new(range: TimeRange) -> Self {
        Self {
            range,
            service: None,
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }
}
