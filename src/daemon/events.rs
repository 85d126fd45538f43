use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Job, Stats};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum TelemetryEvent {
    /// Published on every fast tick.
    TelemetryUpdated {
        stats: Stats,
        recent_jobs: Vec<Job>,
        timestamp: DateTime<Utc>,
    },
    /// Published after a job is submitted or cancelled through the API.
    JobChanged {
        job_id: String,
        change: JobChangeKind,
        timestamp: DateTime<Utc>,
    },
}

impl TelemetryEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryEvent::TelemetryUpdated { .. } => "telemetry_updated",
            TelemetryEvent::JobChanged { .. } => "job_changed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobChangeKind {
    Submitted,
    Cancelled,
}
