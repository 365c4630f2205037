use std::sync::Arc;

use nefi_backoff::Backoff;
use nefi_core::Event;
use nefi_task::Shutdown;
use nefi_wire::proto::event_stream_client::EventStreamClient;
use nefi_wire::proto::Batch;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::Channel;
use tracing::{info, warn};

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::queue::BoundedQueue;

/// Per-node export client (spec §4.3): buffers events in a bounded queue
/// and drains them to the collector over a client-streaming RPC,
/// reconnecting with exponential backoff on failure.
pub struct ExportClient {
    config: ExportConfig,
    queue: Mutex<BoundedQueue<Event>>,
}

impl ExportClient {
    pub fn new(config: ExportConfig) -> Self {
        let queue = Mutex::new(BoundedQueue::new(config.queue_bound));
        Self { config, queue }
    }

    /// Enqueues an event, dropping the oldest queued event if the queue is full.
    pub async fn enqueue(&self, event: Event) {
        self.queue.lock().await.push(event);
    }

    pub async fn queued(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn dropped(&self) -> u64 {
        self.queue.lock().await.dropped()
    }

    /// Runs the reconnect loop until `shutdown` fires, then performs a
    /// final best-effort flush before returning.
    pub async fn run(self: Arc<Self>, shutdown: Shutdown) {
        let mut backoff = Backoff::new(self.config.initial_backoff, self.config.max_backoff);

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match self.dial().await {
                Ok(channel) => {
                    backoff.reset();
                    info!(addr = %self.config.server_addr, "export connected");
                    match self.drain_connection(channel, &shutdown).await {
                        Ok(()) => break,
                        Err(e) => warn!(error = %e, "export stream ended, reconnecting"),
                    }
                }
                Err(e) => warn!(error = %e, "export dial failed"),
            }

            if shutdown.is_cancelled() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(backoff.next_delay()) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        self.final_flush().await;
    }

    async fn dial(&self) -> Result<Channel, ExportError> {
        let endpoint = Channel::from_shared(self.config.server_addr.clone())?
            .timeout(self.config.dial_timeout)
            .connect_timeout(self.config.dial_timeout);
        Ok(endpoint.connect().await?)
    }

    /// Drives the flush loop over one connection. Returns `Ok(())` only on
    /// clean shutdown; any transport or decode problem returns `Err` so the
    /// caller reconnects.
    async fn drain_connection(
        &self,
        channel: Channel,
        shutdown: &Shutdown,
    ) -> Result<(), ExportError> {
        let mut client = EventStreamClient::new(channel);
        let (tx, rx) = mpsc::channel::<Batch>(8);
        let call = client.stream_events(ReceiverStream::new(rx));
        tokio::pin!(call);

        let mut ticker = tokio::time::interval(self.config.flush_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    drop(tx);
                    let _ = call.await;
                    return Ok(());
                }
                result = &mut call => {
                    result?;
                    return Err(ExportError::Send(tonic::Status::aborted("server closed stream")));
                }
                _ = ticker.tick() => {
                    let batch = { self.queue.lock().await.pop_front_batch(self.config.batch_size) };
                    if batch.is_empty() {
                        continue;
                    }
                    let envelope = nefi_wire::build_batch(&self.config.node, &batch);
                    if tx.send(envelope).await.is_err() {
                        self.queue.lock().await.requeue_front(batch);
                        return Err(ExportError::Send(tonic::Status::unavailable("send channel closed")));
                    }
                }
            }
        }
    }

    /// Best-effort drain of whatever remains queued when shutting down.
    /// Never blocks indefinitely: a broken connection here is swallowed,
    /// since there is no further reconnect attempt once shutdown starts.
    async fn final_flush(&self) {
        let remaining = { self.queue.lock().await.pop_front_batch(self.config.queue_bound) };
        if remaining.is_empty() {
            return;
        }
        match self.dial().await {
            Ok(channel) => {
                let mut client = EventStreamClient::new(channel);
                let (tx, rx) = mpsc::channel::<Batch>(1);
                let call = client.stream_events(ReceiverStream::new(rx));
                let envelope = nefi_wire::build_batch(&self.config.node, &remaining);
                let _ = tx.send(envelope).await;
                drop(tx);
                if let Err(e) = call.await {
                    warn!(error = %e, count = remaining.len(), "final flush failed, events lost");
                }
            }
            Err(e) => warn!(error = %e, count = remaining.len(), "final flush dial failed, events lost"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nefi_core::{ConnectionEvent, Endpoint, Protocol};

    fn sample_event() -> Event {
        Event::Connection(ConnectionEvent {
            timestamp: chrono::Utc::now(),
            node: "node-a".into(),
            source: Endpoint::new("10.0.0.1", 1234),
            destination: Endpoint::new("10.0.0.2", 80),
            bytes_sent: 10,
            bytes_recv: 20,
            duration_ns: 1_000_000,
            retransmits: 0,
            protocol: Protocol::Tcp,
        })
    }

    #[tokio::test]
    async fn enqueue_then_dequeue_via_internal_queue() {
        let client = ExportClient::new(ExportConfig::new("node-a", "http://127.0.0.1:4317"));
        client.enqueue(sample_event()).await;
        assert_eq!(client.queued().await, 1);
    }

    #[tokio::test]
    async fn enqueue_past_bound_drops_oldest() {
        let mut config = ExportConfig::new("node-a", "http://127.0.0.1:4317");
        config.queue_bound = 2;
        let client = ExportClient::new(config);
        for _ in 0..3 {
            client.enqueue(sample_event()).await;
        }
        assert_eq!(client.queued().await, 2);
        assert_eq!(client.dropped().await, 1);
    }
}
