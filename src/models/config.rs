use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_initial_jobs")]
    pub initial_jobs: usize,
    #[serde(default = "default_retention_limit")]
    pub retention_limit: usize,
    #[serde(default = "default_recent_jobs")]
    pub recent_jobs: usize,
    #[serde(default = "default_fast_tick_ms")]
    pub fast_tick_ms: u64,
    #[serde(default = "default_slow_tick_ms")]
    pub slow_tick_ms: u64,
    #[serde(default = "default_queued_to_running")]
    pub queued_to_running: f64,
    #[serde(default = "default_running_to_terminal")]
    pub running_to_terminal: f64,
    #[serde(default = "default_completion_ratio")]
    pub completion_ratio: f64,
    #[serde(default = "default_machine_status_flip")]
    pub machine_status_flip: f64,
    #[serde(default = "default_arrival_chance")]
    pub arrival_chance: f64,
    #[serde(default)]
    pub latency: LatencyConfig,
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
    #[serde(default = "default_activity_feed_size")]
    pub activity_feed_size: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8377
}

fn default_initial_jobs() -> usize {
    50
}

fn default_retention_limit() -> usize {
    100
}

fn default_recent_jobs() -> usize {
    10
}

fn default_fast_tick_ms() -> u64 {
    5_000
}

fn default_slow_tick_ms() -> u64 {
    10_000
}

fn default_queued_to_running() -> f64 {
    0.10
}

fn default_running_to_terminal() -> f64 {
    0.15
}

fn default_completion_ratio() -> f64 {
    0.90
}

fn default_machine_status_flip() -> f64 {
    0.02
}

fn default_arrival_chance() -> f64 {
    0.30
}

fn default_broadcast_capacity() -> usize {
    256
}

fn default_activity_feed_size() -> usize {
    20
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            initial_jobs: default_initial_jobs(),
            retention_limit: default_retention_limit(),
            recent_jobs: default_recent_jobs(),
            fast_tick_ms: default_fast_tick_ms(),
            slow_tick_ms: default_slow_tick_ms(),
            queued_to_running: default_queued_to_running(),
            running_to_terminal: default_running_to_terminal(),
            completion_ratio: default_completion_ratio(),
            machine_status_flip: default_machine_status_flip(),
            arrival_chance: default_arrival_chance(),
            latency: LatencyConfig::default(),
            broadcast_capacity: default_broadcast_capacity(),
            activity_feed_size: default_activity_feed_size(),
            seed: None,
        }
    }
}

impl TrackerConfig {
    pub fn fast_tick(&self) -> Duration {
        Duration::from_millis(self.fast_tick_ms)
    }

    pub fn slow_tick(&self) -> Duration {
        Duration::from_millis(self.slow_tick_ms)
    }

    /// Reject values the simulation cannot run with: zero timer periods,
    /// a zero retention ceiling, and probabilities outside [0, 1].
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.fast_tick_ms == 0 {
            anyhow::bail!("fast_tick_ms must be greater than 0");
        }
        if self.slow_tick_ms == 0 {
            anyhow::bail!("slow_tick_ms must be greater than 0");
        }
        if self.retention_limit == 0 {
            anyhow::bail!("retention_limit must be greater than 0");
        }

        let probabilities = [
            ("queued_to_running", self.queued_to_running),
            ("running_to_terminal", self.running_to_terminal),
            ("completion_ratio", self.completion_ratio),
            ("machine_status_flip", self.machine_status_flip),
            ("arrival_chance", self.arrival_chance),
        ];
        for (name, value) in probabilities {
            // NaN fails the range check too.
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be between 0 and 1, got {}", name, value);
            }
        }
        Ok(())
    }
}

/// Simulated network delay per API operation, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LatencyConfig {
    #[serde(default = "default_initialize_ms")]
    pub initialize_ms: u64,
    #[serde(default = "default_list_jobs_ms")]
    pub list_jobs_ms: u64,
    #[serde(default = "default_get_job_ms")]
    pub get_job_ms: u64,
    #[serde(default = "default_list_machines_ms")]
    pub list_machines_ms: u64,
    #[serde(default = "default_get_stats_ms")]
    pub get_stats_ms: u64,
    #[serde(default = "default_submit_job_ms")]
    pub submit_job_ms: u64,
    #[serde(default = "default_cancel_job_ms")]
    pub cancel_job_ms: u64,
}

fn default_initialize_ms() -> u64 {
    1000
}

fn default_list_jobs_ms() -> u64 {
    200
}

fn default_get_job_ms() -> u64 {
    150
}

fn default_list_machines_ms() -> u64 {
    100
}

fn default_get_stats_ms() -> u64 {
    50
}

fn default_submit_job_ms() -> u64 {
    300
}

fn default_cancel_job_ms() -> u64 {
    200
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            initialize_ms: default_initialize_ms(),
            list_jobs_ms: default_list_jobs_ms(),
            get_job_ms: default_get_job_ms(),
            list_machines_ms: default_list_machines_ms(),
            get_stats_ms: default_get_stats_ms(),
            submit_job_ms: default_submit_job_ms(),
            cancel_job_ms: default_cancel_job_ms(),
        }
    }
}

impl LatencyConfig {
    /// No artificial delay anywhere. Used by tests and `--no-latency`.
    pub fn none() -> Self {
        Self {
            initialize_ms: 0,
            list_jobs_ms: 0,
            get_job_ms: 0,
            list_machines_ms: 0,
            get_stats_ms: 0,
            submit_job_ms: 0,
            cancel_job_ms: 0,
        }
    }
}
