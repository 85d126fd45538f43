pub mod config;
pub mod job;
pub mod machine;
pub mod stats;

pub use config::{LatencyConfig, TrackerConfig};
pub use job::{format_duration, Job, JobFilter, JobSpec, JobStatus};
pub use machine::{Machine, MachineKind, MachineProfile, MachineStatus, MACHINE_ROSTER};
pub use stats::Stats;
