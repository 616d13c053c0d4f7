//! Health check handler.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub inferences_since_load: u64,
    pub total_inferences: u64,
    pub reloads: u64,
    pub recycle_interval: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" while the engine thread is serving, "degraded" otherwise.
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub model: String,
    pub detector: &'static str,
    pub metric: String,
    pub engine: EngineStatus,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let running = state.engine.is_running();
    let stats = state.engine.stats();

    Json(HealthResponse {
        status: if running { "ok" } else { "degraded" },
        service: "sabaiface",
        version: env!("CARGO_PKG_VERSION"),
        model: state.engine.model().to_string(),
        detector: "scrfd",
        metric: state.metric.to_string(),
        engine: EngineStatus {
            running,
            inferences_since_load: stats.since_load,
            total_inferences: stats.total_inferences,
            reloads: stats.reloads,
            recycle_interval: stats.recycle_interval,
        },
    })
}
