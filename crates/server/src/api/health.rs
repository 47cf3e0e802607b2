use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use calc_compute::MetricsSnapshot;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Server is up", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[utoipa::path(
    get,
    path = "/scheduler/metrics",
    tag = "Health",
    responses(
        (status = 200, description = "Scheduler counters and queue depth", body = Object)
    )
)]
pub async fn scheduler_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.dispatcher.metrics())
}
