//! The per-node agent binary: wires the probe loader, identity cache, and
//! export client together and serves health endpoints (spec §6, "agent
//! environment options").

mod health;

use std::sync::Arc;

use anyhow::Context;
use nefi_core::Event;
use nefi_export::{ExportClient, ExportConfig};
use nefi_identity::IdentityCache;
use nefi_probe::ProbeLoader;
use nefi_task::Shutdown;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

use crate::health::Readiness;

fn init_logging() {
    let filter = std::env::var("NEFI_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let node_name = std::env::var("NODE_NAME").context("NODE_NAME is required")?;
    let server_addr =
        std::env::var("SERVER_ADDR").unwrap_or_else(|_| "http://127.0.0.1:4317".to_string());
    let ebpf_object_path =
        std::env::var("EBPF_OBJECT_PATH").unwrap_or_else(|_| "/opt/nefi/bpf".to_string());
    let health_addr = std::env::var("HEALTH_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let shutdown = Shutdown::new();
    let readiness = Readiness::new();

    let health_listener = tokio::net::TcpListener::bind(&health_addr).await?;
    let health_shutdown = shutdown.child();
    let health_router = readiness.router();
    tokio::spawn(async move {
        let server = axum::serve(health_listener, health_router)
            .with_graceful_shutdown(async move { health_shutdown.cancelled().await });
        if let Err(e) = server.await {
            error!(error = %e, "health server exited");
        }
    });

    let identity = Arc::new(IdentityCache::connect().await.context("connecting identity cache")?);
    let (identity_ready_tx, identity_ready_rx) = oneshot::channel();
    let identity_task = {
        let identity = identity.clone();
        let shutdown = shutdown.child();
        tokio::spawn(async move { identity.start(shutdown, identity_ready_tx).await })
    };

    let probe_loader = ProbeLoader::new(ebpf_object_path);
    let (event_tx, mut event_rx) = mpsc::channel::<Event>(nefi_probe::MIN_CHANNEL_CAPACITY);
    let (probe_ready_tx, probe_ready_rx) = oneshot::channel();
    let probe_task = {
        let shutdown = shutdown.child();
        tokio::spawn(async move { probe_loader.start(shutdown, event_tx, probe_ready_tx).await })
    };

    identity_ready_rx
        .await
        .context("identity cache task dropped")?
        .context("identity cache initial sync failed")?;
    probe_ready_rx
        .await
        .context("probe loader task dropped")?
        .context("probe loader failed to start")?;
    readiness.mark_ready();
    info!(node = %node_name, "agent ready");

    let export_client = Arc::new(ExportClient::new(ExportConfig::new(node_name, server_addr)));
    let export_task = {
        let export_client = export_client.clone();
        let shutdown = shutdown.child();
        tokio::spawn(async move { export_client.run(shutdown).await })
    };

    let enrich_task = {
        let identity = identity.clone();
        let export_client = export_client.clone();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                export_client.enqueue(enrich(event, &identity)).await;
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("received shutdown signal");
    shutdown.cancel();

    let _ = tokio::join!(identity_task, probe_task, enrich_task, export_task);
    Ok(())
}

/// Resolves source/destination identity via the cache before handing the
/// event to the export client (spec §4.2: lookup is the hot-path contract).
fn enrich(event: Event, identity: &IdentityCache) -> Event {
    match event {
        Event::Connection(mut c) => {
            if let Some(id) = identity.lookup(&c.source.ip) {
                c.source = c.source.with_identity(&id);
            }
            if let Some(id) = identity.lookup(&c.destination.ip) {
                c.destination = c.destination.with_identity(&id);
            }
            Event::Connection(c)
        }
        Event::Request(mut r) => {
            if let Some(id) = identity.lookup(&r.source.ip) {
                r.source = r.source.with_identity(&id);
            }
            if let Some(id) = identity.lookup(&r.destination.ip) {
                r.destination = r.destination.with_identity(&id);
            }
            Event::Request(r)
        }
    }
}
