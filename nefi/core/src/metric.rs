use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single time-series sample, labeled for storage.
///
/// `labels` always includes `service`; latency points add `quantile`,
/// traffic points add `direction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub value: f64,
    pub labels: BTreeMap<String, String>,
}

impl TimeSeriesPoint {
    pub fn new(timestamp: chrono::DateTime<chrono::Utc>, value: f64, service: &str) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert("service".to_string(), service.to_string());
        Self {
            timestamp,
            value,
            labels,
        }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn service(&self) -> Option<&str> {
        self.labels.get("service").map(String::as_str)
    }
}

/// The four kinds of metric points a storage adapter may be asked to write,
/// per the `write_metrics(points, metric_type)` capability (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricType {
    Latency,
    CallRate,
    ErrorRate,
    Traffic,
}
