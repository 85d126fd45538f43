use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::telemetry::ConnectionStatus;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub connection: ConnectionStatus,
    pub uptime_seconds: u64,
    pub total_jobs: usize,
    pub total_machines: usize,
    pub scheduler_interval_ms: u64,
    pub version: String,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Health check");

    let (total_jobs, total_machines) = match state.api.snapshot(0).await {
        Ok((stats, _)) => (stats.total_jobs(), stats.total_machines),
        Err(_) => (0, 0),
    };

    let response = HealthResponse {
        status: "ok".to_string(),
        connection: state.api.connection_status().await,
        uptime_seconds: state.start_time.elapsed().as_secs(),
        total_jobs,
        total_machines,
        scheduler_interval_ms: state.config.fast_tick_ms,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (StatusCode::OK, Json(response))
}
