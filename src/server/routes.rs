use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::daemon::events::{JobChangeKind, TelemetryEvent};
use crate::errors::TrackerError;
use crate::models::{JobFilter, JobSpec, JobStatus};

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

fn error_response(status: StatusCode, error: &str, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        }),
    )
        .into_response()
}

fn tracker_error(err: &TrackerError) -> Response {
    let status = match err {
        TrackerError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
        TrackerError::NotFound(_) => StatusCode::NOT_FOUND,
        TrackerError::InvalidTransition { .. } => StatusCode::CONFLICT,
        TrackerError::Validation(_) => StatusCode::BAD_REQUEST,
    };
    error_response(status, err.code(), &err.to_string())
}

fn publish_change(state: &AppState, job_id: &str, change: JobChangeKind) {
    let _ = state.event_tx.send(TelemetryEvent::JobChanged {
        job_id: job_id.to_string(),
        change,
        timestamp: Utc::now(),
    });
}

// ---------------------------------------------------------------------------
// Query params
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
pub struct ListJobsParams {
    pub status: Option<String>,
    pub backend: Option<String>,
    pub search: Option<String>,
    pub limit: Option<usize>,
}

impl ListJobsParams {
    fn into_filter(self) -> Result<JobFilter, TrackerError> {
        let status = self
            .status
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<JobStatus>())
            .transpose()?;
        Ok(JobFilter {
            status,
            backend: self.backend.filter(|b| !b.is_empty()),
            search: self
                .search
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            limit: self.limit,
        })
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/stats
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Response {
    match state.api.get_stats().await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => tracker_error(&e),
    }
}

/// GET /api/jobs
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Response {
    let filter = match params.into_filter() {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!("Rejected job filter: {}", e);
            return tracker_error(&e);
        }
    };

    match state.api.list_jobs(filter).await {
        Ok(jobs) => (StatusCode::OK, Json(jobs)).into_response(),
        Err(e) => tracker_error(&e),
    }
}

/// POST /api/jobs
pub async fn submit_job(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<JobSpec>,
) -> Response {
    match state.api.submit_job(spec).await {
        Ok(job) => {
            publish_change(&state, &job.id, JobChangeKind::Submitted);
            (StatusCode::CREATED, Json(job)).into_response()
        }
        Err(e) => {
            tracing::warn!("Job submission failed: {}", e);
            tracker_error(&e)
        }
    }
}

/// GET /api/jobs/{id}
pub async fn get_job(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.api.get_job(&id).await {
        Ok(job) => (StatusCode::OK, Json(job)).into_response(),
        Err(e) => tracker_error(&e),
    }
}

/// POST /api/jobs/{id}/cancel
pub async fn cancel_job(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.api.cancel_job(&id).await {
        Ok(job) => {
            publish_change(&state, &job.id, JobChangeKind::Cancelled);
            (StatusCode::OK, Json(job)).into_response()
        }
        Err(e) => {
            tracing::warn!("Cancel failed for '{}': {}", id, e);
            tracker_error(&e)
        }
    }
}

/// GET /api/machines
pub async fn list_machines(State(state): State<Arc<AppState>>) -> Response {
    match state.api.list_machines().await {
        Ok(machines) => (StatusCode::OK, Json(machines)).into_response(),
        Err(e) => tracker_error(&e),
    }
}

/// GET /api/dashboard
pub async fn get_dashboard(State(state): State<Arc<AppState>>) -> Response {
    (StatusCode::OK, Json(state.views.current().await)).into_response()
}

/// POST /api/dashboard/refresh
pub async fn refresh_dashboard(State(state): State<Arc<AppState>>) -> Response {
    match state.pipeline.refresh_now().await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => tracker_error(&e),
    }
}
