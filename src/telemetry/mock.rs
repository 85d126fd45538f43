use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::errors::TrackerError;
use crate::models::{Job, JobFilter, JobSpec, LatencyConfig, Machine, Stats, TrackerConfig};

use super::clock::{Clock, SystemClock};
use super::random::{Entropy, SeededEntropy};
use super::store::TelemetryStore;
use super::{ConnectionStatus, TelemetryApi};

/// In-memory [`TelemetryApi`] backed by a [`TelemetryStore`].
///
/// Each call first sleeps for its configured latency and only then takes
/// the store lock, so two overlapping calls may observe each other's
/// mutations in either order.
pub struct MockTelemetry {
    store: Mutex<TelemetryStore>,
    latency: LatencyConfig,
}

impl MockTelemetry {
    pub fn new(config: Arc<TrackerConfig>) -> Self {
        let entropy: Box<dyn Entropy> = match config.seed {
            Some(seed) => Box::new(SeededEntropy::from_seed(seed)),
            None => Box::new(SeededEntropy::from_os()),
        };
        Self::with_parts(config, entropy, Arc::new(SystemClock))
    }

    pub fn with_parts(
        config: Arc<TrackerConfig>,
        entropy: Box<dyn Entropy>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let latency = config.latency.clone();
        Self {
            store: Mutex::new(TelemetryStore::new(config, entropy, clock)),
            latency,
        }
    }

    async fn delay(ms: u64) {
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl TelemetryApi for MockTelemetry {
    async fn initialize(&self) -> Result<(), TrackerError> {
        Self::delay(self.latency.initialize_ms).await;
        let mut store = self.store.lock().await;
        store.initialize();
        tracing::info!("Mock telemetry initialized");
        Ok(())
    }

    async fn connection_status(&self) -> ConnectionStatus {
        if self.store.lock().await.is_initialized() {
            ConnectionStatus::Online
        } else {
            ConnectionStatus::Offline
        }
    }

    async fn get_stats(&self) -> Result<Stats, TrackerError> {
        Self::delay(self.latency.get_stats_ms).await;
        self.store.lock().await.get_stats()
    }

    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<Job>, TrackerError> {
        Self::delay(self.latency.list_jobs_ms).await;
        self.store.lock().await.list_jobs(&filter)
    }

    async fn get_job(&self, id: &str) -> Result<Job, TrackerError> {
        Self::delay(self.latency.get_job_ms).await;
        self.store.lock().await.get_job(id)
    }

    async fn list_machines(&self) -> Result<Vec<Machine>, TrackerError> {
        Self::delay(self.latency.list_machines_ms).await;
        self.store.lock().await.list_machines()
    }

    async fn submit_job(&self, spec: JobSpec) -> Result<Job, TrackerError> {
        Self::delay(self.latency.submit_job_ms).await;
        let job = self.store.lock().await.submit_job(spec)?;
        tracing::info!(job_id = %job.id, backend = %job.backend, "Job submitted");
        Ok(job)
    }

    async fn cancel_job(&self, id: &str) -> Result<Job, TrackerError> {
        Self::delay(self.latency.cancel_job_ms).await;
        let job = self.store.lock().await.cancel_job(id)?;
        tracing::info!(job_id = %job.id, "Job cancelled");
        Ok(job)
    }

    async fn snapshot(&self, recent: usize) -> Result<(Stats, Vec<Job>), TrackerError> {
        self.store.lock().await.snapshot(recent)
    }

    async fn tick_statuses(&self) -> Result<usize, TrackerError> {
        self.store.lock().await.tick_statuses()
    }

    async fn tick_machines(&self) -> Result<(), TrackerError> {
        self.store.lock().await.tick_machines()
    }

    async fn tick_arrivals(&self) -> Result<Option<Job>, TrackerError> {
        self.store.lock().await.tick_arrivals()
    }
}
