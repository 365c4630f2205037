use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use nefi_aggregate::AccumulatorMap;
use nefi_core::Event;
use nefi_storage::StorageAdapter;
use nefi_wire::proto;
use tonic::{Request, Response, Status, Streaming};
use tracing::warn;

/// Implements the `StreamEvents` RPC (spec §4.4): decodes each batch,
/// writes it to storage, and publishes every event to the aggregator.
///
/// A storage write error is logged and only that sub-batch's count is
/// withheld from the running total; the stream continues. A receive or
/// decode error (surfaced by tonic as a transport `Status`) terminates the
/// stream. RPC cancellation is handled by tonic dropping this future.
#[derive(Clone)]
pub struct IngestService {
    storage: Arc<dyn StorageAdapter>,
    accumulators: Arc<AccumulatorMap>,
    accepted: Arc<AtomicU64>,
}

impl IngestService {
    pub fn new(storage: Arc<dyn StorageAdapter>, accumulators: Arc<AccumulatorMap>) -> Self {
        Self {
            storage,
            accumulators,
            accepted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A monotonic count of events durably accepted so far, exposed for
    /// readiness diagnostics.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    async fn process_batch(&self, batch: proto::Batch) -> u64 {
        let events = nefi_wire::decode_batch(batch);
        let mut connections = Vec::new();
        let mut requests = Vec::new();
        for event in &events {
            match event {
                Event::Connection(c) => connections.push(c.clone()),
                Event::Request(r) => requests.push(r.clone()),
            }
        }

        let mut processed = 0u64;
        if !connections.is_empty() {
            match self.storage.write_connections(&connections).await {
                Ok(()) => processed += connections.len() as u64,
                Err(e) => warn!(error = %e, count = connections.len(), "ingest: connection write failed"),
            }
        }
        if !requests.is_empty() {
            match self.storage.write_requests(&requests).await {
                Ok(()) => processed += requests.len() as u64,
                Err(e) => warn!(error = %e, count = requests.len(), "ingest: request write failed"),
            }
        }

        for event in &events {
            self.accumulators.observe(event);
        }

        self.accepted.fetch_add(processed, Ordering::Relaxed);
        processed
    }
}

#[tonic::async_trait]
impl proto::event_stream_server::EventStream for IngestService {
    async fn stream_events(
        &self,
        request: Request<Streaming<proto::Batch>>,
    ) -> Result<Response<proto::StreamResponse>, Status> {
        let mut stream = request.into_inner();
        let mut total_accepted: u64 = 0;

        loop {
            match stream.message().await {
                Ok(Some(batch)) => total_accepted += self.process_batch(batch).await,
                Ok(None) => break,
                Err(status) => return Err(status),
            }
        }

        Ok(Response::new(proto::StreamResponse {
            accepted: total_accepted,
            error: None,
        }))
    }
}
