use thiserror::Error;

use crate::models::JobStatus;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackerError {
    #[error("Not initialized: telemetry has not been initialized yet")]
    NotInitialized,

    #[error("Not found: job '{0}'")]
    NotFound(String),

    #[error("Invalid transition: job '{id}' is already {status}")]
    InvalidTransition { id: String, status: JobStatus },

    #[error("Validation error: {0}")]
    Validation(String),
}

impl TrackerError {
    /// Machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            TrackerError::NotInitialized => "not_initialized",
            TrackerError::NotFound(_) => "not_found",
            TrackerError::InvalidTransition { .. } => "invalid_transition",
            TrackerError::Validation(_) => "validation_error",
        }
    }
}
