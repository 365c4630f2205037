//! The cluster collector binary: wires ingestion, aggregation, and
//! dependency computation together over a storage backend, and serves
//! health endpoints (spec §6, "collector environment options").

mod health;

use std::sync::Arc;

use anyhow::Context;
use nefi_aggregate::Aggregator;
use nefi_dependency::DependencyComputer;
use nefi_ingest::IngestService;
use nefi_storage::InMemoryStorage;
use nefi_task::Shutdown;
use nefi_wire::proto::event_stream_server::EventStreamServer;
use tracing::{error, info, warn};

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

    let grpc_port: u16 = std::env::var("GRPC_PORT")
        .unwrap_or_else(|_| "4317".to_string())
        .parse()
        .context("GRPC_PORT must be a u16")?;
    let http_port: u16 = std::env::var("HTTP_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .context("HTTP_PORT must be a u16")?;
    if let Ok(es_addresses) = std::env::var("ES_ADDRESSES") {
        warn!(
            es_addresses = %es_addresses,
            "ES_ADDRESSES is recognised but this build only ships the in-memory reference storage adapter"
        );
    }

    let shutdown = Shutdown::new();
    let storage = Arc::new(InMemoryStorage::new());

    let aggregator = Arc::new(Aggregator::new(storage.clone()));
    let accumulators = aggregator.accumulators();
    let aggregator_task = {
        let aggregator = aggregator.clone();
        let shutdown = shutdown.child();
        tokio::spawn(async move { aggregator.run(shutdown).await })
    };

    let dependency_computer = Arc::new(DependencyComputer::new(storage.clone()));
    let dependency_task = {
        let dependency_computer = dependency_computer.clone();
        let shutdown = shutdown.child();
        tokio::spawn(async move { dependency_computer.run(shutdown).await })
    };

    let ingest_service = IngestService::new(storage.clone(), accumulators);

    let readiness = Readiness::new(Arc::new(ingest_service.clone()));
    let http_addr = format!("0.0.0.0:{http_port}");
    let health_listener = tokio::net::TcpListener::bind(&http_addr).await?;
    let health_shutdown = shutdown.child();
    let health_router = readiness.router();
    let health_task = tokio::spawn(async move {
        let server = axum::serve(health_listener, health_router)
            .with_graceful_shutdown(async move { health_shutdown.cancelled().await });
        if let Err(e) = server.await {
            error!(error = %e, "health server exited");
        }
    });

    let grpc_addr = format!("0.0.0.0:{grpc_port}").parse()?;
    let grpc_shutdown = shutdown.child();
    let grpc_task = tokio::spawn(async move {
        let server = tonic::transport::Server::builder()
            .add_service(EventStreamServer::new(ingest_service))
            .serve_with_shutdown(grpc_addr, async move { grpc_shutdown.cancelled().await });
        if let Err(e) = server.await {
            error!(error = %e, "gRPC server exited");
        }
    });

    info!(grpc_port, http_port, "collector ready");

    tokio::signal::ctrl_c().await?;
    info!("received shutdown signal");
    shutdown.cancel();

    let _ = tokio::join!(aggregator_task, dependency_task, health_task, grpc_task);
    Ok(())
}
