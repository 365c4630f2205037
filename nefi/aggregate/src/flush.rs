use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use nefi_core::{Histogram, MetricType, TimeSeriesPoint};
use nefi_storage::StorageAdapter;
use nefi_task::Shutdown;
use tracing::{info, warn};

use crate::accumulator::AccumulatorMap;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Builds the emitted points for one service's flushed histogram (spec
/// §4.5, "Emitted points per service per flush").
pub fn emit_points(service: &str, hist: &Histogram) -> (Vec<TimeSeriesPoint>, TimeSeriesPoint, TimeSeriesPoint, Vec<TimeSeriesPoint>) {
    let now = hist.last_observed.unwrap_or_else(Utc::now);

    let latency = vec![
        TimeSeriesPoint::new(now, hist.percentile(0.50), service).with_label("quantile", "p50"),
        TimeSeriesPoint::new(now, hist.percentile(0.95), service).with_label("quantile", "p95"),
        TimeSeriesPoint::new(now, hist.percentile(0.99), service).with_label("quantile", "p99"),
    ];
    let call_rate = TimeSeriesPoint::new(now, hist.call_count as f64, service);
    let error_rate = TimeSeriesPoint::new(now, hist.error_rate(), service);
    let traffic = vec![
        TimeSeriesPoint::new(now, hist.bytes_sent as f64, service).with_label("direction", "sent"),
        TimeSeriesPoint::new(now, hist.bytes_recv as f64, service).with_label("direction", "recv"),
    ];
    (latency, call_rate, error_rate, traffic)
}

/// Drives the periodic flush loop (spec §4.5): swap accumulators for an
/// empty map, compute summary statistics on the swapped-out copy, write to
/// storage. Stopping performs one final flush before returning.
pub struct Aggregator {
    accumulators: Arc<AccumulatorMap>,
    storage: Arc<dyn StorageAdapter>,
    flush_interval: Duration,
}

impl Aggregator {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self {
            accumulators: Arc::new(AccumulatorMap::new()),
            storage,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn accumulators(&self) -> Arc<AccumulatorMap> {
        self.accumulators.clone()
    }

    pub async fn run(&self, shutdown: Shutdown) {
        let mut ticker = tokio::time::interval(self.flush_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.flush_once().await,
                _ = shutdown.cancelled() => {
                    self.flush_once().await;
                    return;
                }
            }
        }
    }

    async fn flush_once(&self) {
        let snapshot = self.accumulators.swap_out();
        if snapshot.is_empty() {
            return;
        }

        let mut latency_points = Vec::new();
        let mut call_rate_points = Vec::new();
        let mut error_rate_points = Vec::new();
        let mut traffic_points = Vec::new();

        for (service, hist) in &snapshot {
            let (latency, call_rate, error_rate, traffic) = emit_points(service, hist);
            latency_points.extend(latency);
            call_rate_points.push(call_rate);
            error_rate_points.push(error_rate);
            traffic_points.extend(traffic);
        }

        if let Err(e) = self.storage.write_metrics(&latency_points, MetricType::Latency).await {
            warn!(error = %e, "aggregator flush: latency write failed");
        }
        if let Err(e) = self.storage.write_metrics(&call_rate_points, MetricType::CallRate).await {
            warn!(error = %e, "aggregator flush: call-rate write failed");
        }
        if let Err(e) = self.storage.write_metrics(&error_rate_points, MetricType::ErrorRate).await {
            warn!(error = %e, "aggregator flush: error-rate write failed");
        }
        if let Err(e) = self.storage.write_metrics(&traffic_points, MetricType::Traffic).await {
            warn!(error = %e, "aggregator flush: traffic write failed");
        }
        info!(services = snapshot.len(), "aggregator flushed");
    }
}
