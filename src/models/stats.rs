use serde::{Deserialize, Serialize};

/// Point-in-time aggregate over the job and machine collections.
///
/// The counters are derived from the collections. `average_wait_time`
/// (minutes) and `success_rate` (percent) are freestanding gauges that are
/// resampled every time stats are computed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Stats {
    pub running_jobs: usize,
    pub queued_jobs: usize,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
    pub cancelled_jobs: usize,
    pub active_machines: usize,
    pub total_machines: usize,
    pub average_wait_time: f64,
    pub success_rate: f64,
    pub total_jobs_today: usize,
}

impl Stats {
    pub fn total_jobs(&self) -> usize {
        self.running_jobs
            + self.queued_jobs
            + self.completed_jobs
            + self.failed_jobs
            + self.cancelled_jobs
    }
}
