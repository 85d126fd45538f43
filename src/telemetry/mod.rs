pub mod clock;
pub mod mock;
pub mod random;
pub mod store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::TrackerError;
use crate::models::{Job, JobFilter, JobSpec, Machine, Stats};

pub use clock::{Clock, FakeClock, SystemClock};
pub use mock::MockTelemetry;
pub use random::{Entropy, RandomSource, ScriptedEntropy, SeededEntropy};
pub use store::TelemetryStore;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Online,
    Offline,
}

/// The telemetry surface consumed by the HTTP layer, the update scheduler
/// and the view refresh pipeline.
#[async_trait]
pub trait TelemetryApi: Send + Sync {
    async fn initialize(&self) -> Result<(), TrackerError>;
    async fn connection_status(&self) -> ConnectionStatus;

    async fn get_stats(&self) -> Result<Stats, TrackerError>;
    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<Job>, TrackerError>;
    async fn get_job(&self, id: &str) -> Result<Job, TrackerError>;
    async fn list_machines(&self) -> Result<Vec<Machine>, TrackerError>;
    async fn submit_job(&self, spec: JobSpec) -> Result<Job, TrackerError>;
    async fn cancel_job(&self, id: &str) -> Result<Job, TrackerError>;

    /// Stats and the `recent` newest jobs, read under a single lock.
    async fn snapshot(&self, recent: usize) -> Result<(Stats, Vec<Job>), TrackerError>;

    async fn tick_statuses(&self) -> Result<usize, TrackerError>;
    async fn tick_machines(&self) -> Result<(), TrackerError>;
    async fn tick_arrivals(&self) -> Result<Option<Job>, TrackerError>;
}
