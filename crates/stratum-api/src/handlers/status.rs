//! `/status` and `/stats` handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::ApiState;
use crate::stats::DaemonStatsSnapshot;

#[derive(Serialize)]
pub struct StatusResponse {
    pub object_backend: String,
    pub kv_backend: String,
    pub uptime_secs: u64,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        object_backend: state.object_backend_module,
        kv_backend: state.kv_backend_module,
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub async fn handle_stats(State(state): State<ApiState>) -> Json<DaemonStatsSnapshot> {
    Json(state.stats.snapshot())
}
