use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::TrackerError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    /// No automatic or explicit transition leaves a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TrackerError::Validation(format!("unknown job status '{}'", s)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub backend: String,
    pub circuit_label: String,
    pub shots: u32,
    pub created: DateTime<Utc>,
    pub duration: Option<String>,
    pub qubits: u32,
    pub depth: u32,
    pub user_id: String,
}

/// Caller-supplied fields for a submitted job. Anything left out is
/// defaulted or randomized by the store.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct JobSpec {
    pub backend: Option<String>,
    pub circuit_label: Option<String>,
    pub shots: Option<u32>,
    pub qubits: Option<u32>,
    pub depth: Option<u32>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub backend: Option<String>,
    /// Case-insensitive substring over id, backend and status.
    pub search: Option<String>,
    pub limit: Option<usize>,
}

impl JobFilter {
    pub fn matches(&self, job: &Job) -> bool {
        if let Some(status) = self.status {
            if job.status != status {
                return false;
            }
        }
        if let Some(ref backend) = self.backend {
            if &job.backend != backend {
                return false;
            }
        }
        if let Some(ref term) = self.search {
            let term = term.to_lowercase();
            let hit = [job.id.as_str(), job.backend.as_str(), job.status.as_str()]
                .iter()
                .any(|field| field.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Format an elapsed number of seconds the way the dashboard shows it:
/// `45s`, `12m 5s`, `2h 14m`.
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_job(id: &str, status: JobStatus, backend: &str) -> Job {
        Job {
            id: id.to_string(),
            status,
            backend: backend.to_string(),
            circuit_label: "Bell State".to_string(),
            shots: 1024,
            created: Utc::now(),
            duration: None,
            qubits: 4,
            depth: 20,
            user_id: "user_1234".to_string(),
        }
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&JobStatus::Cancelled).expect("serialize");
        assert_eq!(json, "\"cancelled\"");
        let status: JobStatus = serde_json::from_str("\"running\"").expect("deserialize");
        assert_eq!(status, JobStatus::Running);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("queued".parse::<JobStatus>().unwrap(), JobStatus::Queued);
        assert_eq!(" Failed ".parse::<JobStatus>().unwrap(), JobStatus::Failed);
        let err = "paused".parse::<JobStatus>().unwrap_err();
        assert!(matches!(err, TrackerError::Validation(_)));
    }

    #[test]
    fn test_filter_by_status_and_backend() {
        let job = make_job("a", JobStatus::Queued, "ibm_kyoto");

        assert!(JobFilter::default().matches(&job));

        let by_status = JobFilter {
            status: Some(JobStatus::Queued),
            ..Default::default()
        };
        assert!(by_status.matches(&job));

        let wrong_backend = JobFilter {
            status: Some(JobStatus::Queued),
            backend: Some("ibm_osaka".to_string()),
            search: None,
            limit: None,
        };
        assert!(!wrong_backend.matches(&job));
    }

    #[test]
    fn test_search_is_case_insensitive_over_id_backend_and_status() {
        let job = make_job("ab12cd34", JobStatus::Running, "ibm_kyoto");
        let search = |term: &str| JobFilter {
            search: Some(term.to_string()),
            ..Default::default()
        };

        assert!(search("AB12").matches(&job));
        assert!(search("Kyoto").matches(&job));
        assert!(search("RUNN").matches(&job));
        assert!(!search("osaka").matches(&job));
        // Circuit labels are not searched.
        assert!(!search("bell").matches(&job));
    }

    #[test]
    fn test_filter_deserializes_from_partial_json() {
        let filter: JobFilter =
            serde_json::from_str(r#"{"status":"running","limit":5}"#).expect("deserialize");
        assert_eq!(filter.status, Some(JobStatus::Running));
        assert_eq!(filter.backend, None);
        assert_eq!(filter.search, None);
        assert_eq!(filter.limit, Some(5));
    }

    #[test]
    fn test_format_duration_seconds() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(59), "59s");
    }

    #[test]
    fn test_format_duration_minutes() {
        assert_eq!(format_duration(60), "1m 0s");
        assert_eq!(format_duration(725), "12m 5s");
        assert_eq!(format_duration(1800), "30m 0s");
    }

    #[test]
    fn test_format_duration_hours() {
        assert_eq!(format_duration(3600), "1h 0m");
        assert_eq!(format_duration(8040), "2h 14m");
    }

    #[test]
    fn test_job_spec_empty_json() {
        let spec: JobSpec = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(spec, JobSpec::default());
    }
}
