use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use nefi_ingest::IngestService;
use serde::Serialize;

/// Health endpoints for the collector. Unlike the agent, the collector has
/// no startup sync to gate on, so `/readyz` is equivalent to `/healthz`;
/// both stay alongside a small stats surface for the `accepted` counter.
#[derive(Clone)]
pub struct Readiness {
    ingest: Arc<IngestService>,
}

#[derive(Serialize)]
struct AcceptedReport {
    accepted: u64,
}

impl Readiness {
    pub fn new(ingest: Arc<IngestService>) -> Self {
        Self { ingest }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/healthz", get(|| async { StatusCode::OK }))
            .route("/readyz", get(|| async { StatusCode::OK }))
            .route("/stats/accepted", get(accepted))
            .with_state(self.clone())
    }
}

async fn accepted(State(state): State<Readiness>) -> Json<AcceptedReport> {
    Json(AcceptedReport {
        accepted: state.ingest.accepted(),
    })
}
