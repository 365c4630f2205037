use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use nefi_storage::{EventQuery, StorageAdapter, TimeRange};
use nefi_task::Shutdown;
use tracing::{info, warn};

use crate::edge::EdgeAccumulatorMap;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_WINDOW: chrono::Duration = chrono::Duration::minutes(5);
/// Combined read budget across both event kinds (spec §4.6 step 1): one
/// kind may consume the whole budget if the other has little traffic.
const MAX_EVENTS_TOTAL: usize = 50_000;

/// Periodically scans a trailing window of events and materialises the
/// service dependency graph (spec §4.6).
pub struct DependencyComputer {
    storage: Arc<dyn StorageAdapter>,
    interval: Duration,
    window: chrono::Duration,
}

impl DependencyComputer {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self {
            storage,
            interval: DEFAULT_INTERVAL,
            window: DEFAULT_WINDOW,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_window(mut self, window: chrono::Duration) -> Self {
        self.window = window;
        self
    }

    pub async fn run(&self, shutdown: Shutdown) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                _ = shutdown.cancelled() => return,
            }
        }
    }

    pub async fn tick(&self) {
        let now = Utc::now();
        let range = TimeRange::new(now - self.window, now);

        let connection_query = EventQuery::new(range).with_limit(MAX_EVENTS_TOTAL);
        let connections = match self.storage.find_connections(&connection_query).await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "dependency computer: connection read failed, skipping cycle");
                return;
            }
        };
        let remaining = MAX_EVENTS_TOTAL.saturating_sub(connections.len());
        let request_query = EventQuery::new(range).with_limit(remaining);
        let requests = match self.storage.find_requests(&request_query).await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "dependency computer: request read failed, skipping cycle");
                return;
            }
        };

        let mut edges = EdgeAccumulatorMap::new();
        for c in &connections {
            edges.add_connection(c);
        }
        for r in &requests {
            edges.add_request(r);
        }
        let links = edges.into_links(now);
        if links.is_empty() {
            return;
        }

        if let Err(e) = self.storage.write_dependencies(&links).await {
            warn!(error = %e, "dependency computer: write failed, skipping cycle");
            return;
        }
        info!(edges = links.len(), "dependency graph updated");
    }
}
