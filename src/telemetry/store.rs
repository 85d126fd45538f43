use std::collections::VecDeque;
use std::sync::Arc;

use crate::errors::TrackerError;
use crate::models::{
    format_duration, Job, JobFilter, JobSpec, JobStatus, Machine, MachineStatus, Stats,
    TrackerConfig, MACHINE_ROSTER,
};

use super::clock::Clock;
use super::random::{Entropy, RandomSource};

/// Backends a generated job may target. Includes simulators that are not
/// part of the machine roster, so `backend` is a name, not a foreign key.
pub const BACKEND_NAMES: [&str; 10] = [
    "ibm_brisbane",
    "ibm_kyoto",
    "ibm_osaka",
    "ibm_sherbrooke",
    "ibm_torino",
    "ibm_quebec",
    "ibmq_qasm_simulator",
    "simulator_mps",
    "simulator_extended_stabilizer",
    "simulator_stabilizer",
];

pub const CIRCUIT_LABELS: [&str; 8] = [
    "Bell State",
    "GHZ State",
    "Quantum Fourier Transform",
    "Grover Search",
    "Variational Quantum Eigensolver",
    "Quantum Approximate Optimization",
    "Shor Algorithm",
    "Random Circuit",
];

const INITIAL_SHOTS: [u32; 4] = [1024, 2048, 4096, 8192];
const ARRIVAL_SHOTS: [u32; 3] = [1024, 2048, 4096];

const INITIAL_STATUSES: [JobStatus; 4] = [
    JobStatus::Running,
    JobStatus::Queued,
    JobStatus::Completed,
    JobStatus::Failed,
];
const INITIAL_STATUS_WEIGHTS: [f64; 4] = [0.15, 0.25, 0.55, 0.05];

const JOB_ID_LENGTH: usize = 8;
const HISTORY_DAYS: u32 = 7;

const FIDELITY_RANGE: (f64, f64) = (80.0, 99.9);
const UPTIME_RANGE: (f64, f64) = (90.0, 99.9);

/// Canonical in-memory job/machine state and every rule that mutates it.
///
/// The store is synchronous: each method finishes all of its mutation
/// before returning, so a caller holding it behind a lock never observes a
/// partial update.
pub struct TelemetryStore {
    config: Arc<TrackerConfig>,
    random: RandomSource,
    clock: Arc<dyn Clock>,
    initialized: bool,
    /// Newest first. Every insert goes to the front.
    jobs: VecDeque<Job>,
    machines: Vec<Machine>,
}

impl TelemetryStore {
    pub fn new(config: Arc<TrackerConfig>, entropy: Box<dyn Entropy>, clock: Arc<dyn Clock>) -> Self {
        Self {
            random: RandomSource::new(entropy, Arc::clone(&clock)),
            config,
            clock,
            initialized: false,
            jobs: VecDeque::new(),
            machines: Vec::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Build the machine roster and the initial job burst from scratch.
    /// Any previous state is discarded.
    pub fn initialize(&mut self) {
        self.machines = self.generate_machines();

        let mut jobs: Vec<Job> = (0..self.config.initial_jobs)
            .map(|_| self.generate_historic_job())
            .collect();
        jobs.sort_by(|a, b| b.created.cmp(&a.created));
        self.jobs = jobs.into();
        self.enforce_retention();

        self.initialized = true;
        tracing::debug!(
            jobs = self.jobs.len(),
            machines = self.machines.len(),
            "Telemetry initialized"
        );
    }

    pub fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, TrackerError> {
        self.ensure_initialized()?;
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(self
            .jobs
            .iter()
            .filter(|job| filter.matches(job))
            .take(limit)
            .cloned()
            .collect())
    }

    pub fn get_job(&self, id: &str) -> Result<Job, TrackerError> {
        self.ensure_initialized()?;
        self.jobs
            .iter()
            .find(|job| job.id == id)
            .cloned()
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))
    }

    pub fn list_machines(&self) -> Result<Vec<Machine>, TrackerError> {
        self.ensure_initialized()?;
        Ok(self.machines.clone())
    }

    /// Always recomputed; the two gauges are resampled on every call.
    pub fn get_stats(&mut self) -> Result<Stats, TrackerError> {
        self.ensure_initialized()?;
        Ok(self.compute_stats())
    }

    /// Stats plus the `recent` newest jobs, taken from the same state.
    pub fn snapshot(&mut self, recent: usize) -> Result<(Stats, Vec<Job>), TrackerError> {
        self.ensure_initialized()?;
        let stats = self.compute_stats();
        let jobs = self.jobs.iter().take(recent).cloned().collect();
        Ok((stats, jobs))
    }

    pub fn submit_job(&mut self, spec: JobSpec) -> Result<Job, TrackerError> {
        self.ensure_initialized()?;
        validate_spec(&spec)?;

        let id = self.random.short_id(JOB_ID_LENGTH);
        let backend = match spec.backend {
            Some(backend) => backend,
            None => self.pick_backend(),
        };
        let qubits = match spec.qubits {
            Some(q) => q,
            None => self.random.uniform_int(2, 10) as u32,
        };
        let depth = match spec.depth {
            Some(d) => d,
            None => self.random.uniform_int(10, 50) as u32,
        };

        let job = Job {
            id,
            status: JobStatus::Queued,
            backend,
            circuit_label: spec
                .circuit_label
                .unwrap_or_else(|| "Custom Circuit".to_string()),
            shots: spec.shots.unwrap_or(1024),
            created: self.clock.now(),
            duration: None,
            qubits,
            depth,
            user_id: spec.user_id.unwrap_or_else(|| "demo_user".to_string()),
        };

        self.jobs.push_front(job.clone());
        self.enforce_retention();
        Ok(job)
    }

    /// Move a queued or running job to `cancelled`. Cancelling never sets a
    /// duration.
    pub fn cancel_job(&mut self, id: &str) -> Result<Job, TrackerError> {
        self.ensure_initialized()?;
        let job = self
            .jobs
            .iter_mut()
            .find(|job| job.id == id)
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))?;

        if job.status.is_terminal() {
            return Err(TrackerError::InvalidTransition {
                id: id.to_string(),
                status: job.status,
            });
        }

        job.status = JobStatus::Cancelled;
        Ok(job.clone())
    }

    /// One probabilistic sweep over every non-terminal job. Returns how many
    /// jobs changed status.
    pub fn tick_statuses(&mut self) -> Result<usize, TrackerError> {
        self.ensure_initialized()?;
        let mut changed = 0;

        for job in self.jobs.iter_mut() {
            match job.status {
                JobStatus::Queued => {
                    if self.random.chance(self.config.queued_to_running) {
                        job.status = JobStatus::Running;
                        changed += 1;
                    }
                }
                JobStatus::Running => {
                    if self.random.chance(self.config.running_to_terminal) {
                        job.status = if self.random.chance(self.config.completion_ratio) {
                            JobStatus::Completed
                        } else {
                            JobStatus::Failed
                        };
                        let elapsed = self.random.uniform_int(30, 1800) as u64;
                        job.duration = Some(format_duration(elapsed));
                        changed += 1;
                    }
                }
                JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => {}
            }
        }

        Ok(changed)
    }

    /// Random-walk every machine's gauges and occasionally resample status.
    pub fn tick_machines(&mut self) -> Result<(), TrackerError> {
        self.ensure_initialized()?;
        let now = self.clock.now();

        for machine in self.machines.iter_mut() {
            if self.random.chance(self.config.machine_status_flip) {
                machine.status = self
                    .random
                    .weighted_choice(&MachineStatus::ALL, Some(&MachineStatus::WEIGHTS))
                    .copied()
                    .unwrap_or(MachineStatus::Online);
            }

            let step = self.random.uniform_int(-3, 3);
            machine.pending = (i64::from(machine.pending) + step).max(0) as u32;

            let drift = self.random.uniform_float(-0.5, 0.5, 1);
            machine.fidelity = round1(machine.fidelity + drift).clamp(FIDELITY_RANGE.0, FIDELITY_RANGE.1);

            let drift = self.random.uniform_float(-0.1, 0.1, 1);
            machine.uptime = round1(machine.uptime + drift).clamp(UPTIME_RANGE.0, UPTIME_RANGE.1);

            machine.last_update = now;
        }

        Ok(())
    }

    /// With the configured arrival chance, insert one fresh queued job at
    /// the front and trim the tail back down to the retention limit.
    pub fn tick_arrivals(&mut self) -> Result<Option<Job>, TrackerError> {
        self.ensure_initialized()?;
        if !self.random.chance(self.config.arrival_chance) {
            return Ok(None);
        }

        let job = self.generate_arrival_job();
        self.jobs.push_front(job.clone());
        self.enforce_retention();
        Ok(Some(job))
    }

    fn ensure_initialized(&self) -> Result<(), TrackerError> {
        if self.initialized {
            Ok(())
        } else {
            Err(TrackerError::NotInitialized)
        }
    }

    fn enforce_retention(&mut self) {
        let limit = self.config.retention_limit;
        if self.jobs.len() > limit {
            let dropped = self.jobs.len() - limit;
            self.jobs.truncate(limit);
            tracing::debug!(dropped, "Evicted oldest jobs past retention limit");
        }
    }

    fn compute_stats(&mut self) -> Stats {
        let count = |status: JobStatus| self.jobs.iter().filter(|j| j.status == status).count();
        let today = self.clock.now().date_naive();

        let running_jobs = count(JobStatus::Running);
        let queued_jobs = count(JobStatus::Queued);
        let completed_jobs = count(JobStatus::Completed);
        let failed_jobs = count(JobStatus::Failed);
        let cancelled_jobs = count(JobStatus::Cancelled);
        let total_jobs_today = self
            .jobs
            .iter()
            .filter(|j| j.created.date_naive() == today)
            .count();
        let active_machines = self
            .machines
            .iter()
            .filter(|m| m.status == MachineStatus::Online)
            .count();

        Stats {
            running_jobs,
            queued_jobs,
            completed_jobs,
            failed_jobs,
            cancelled_jobs,
            active_machines,
            total_machines: self.machines.len(),
            average_wait_time: self.random.uniform_float(1.5, 5.0, 1),
            success_rate: self.random.uniform_float(92.0, 97.0, 1),
            total_jobs_today,
        }
    }

    fn generate_machines(&mut self) -> Vec<Machine> {
        let now = self.clock.now();
        MACHINE_ROSTER
            .iter()
            .map(|profile| Machine {
                name: profile.name.to_string(),
                location: profile.location.to_string(),
                qubit_count: profile.qubit_count,
                kind: profile.kind,
                status: self
                    .random
                    .weighted_choice(&MachineStatus::ALL, Some(&MachineStatus::WEIGHTS))
                    .copied()
                    .unwrap_or(MachineStatus::Online),
                pending: self.random.uniform_int(0, 50) as u32,
                fidelity: self.random.uniform_float(85.0, 99.0, 1),
                uptime: self.random.uniform_float(95.0, 99.9, 1),
                last_update: now,
            })
            .collect()
    }

    /// A job as it might look somewhere in the last week.
    ///
    /// Draw order: id, status, backend, circuit, shots, created, qubits,
    /// depth, user, then duration for terminal statuses only.
    fn generate_historic_job(&mut self) -> Job {
        let id = self.random.short_id(JOB_ID_LENGTH);
        let status = self
            .random
            .weighted_choice(&INITIAL_STATUSES, Some(&INITIAL_STATUS_WEIGHTS))
            .copied()
            .unwrap_or(JobStatus::Queued);
        let backend = self.pick_backend();
        let circuit_label = self.pick_circuit();
        let shots = self
            .random
            .weighted_choice(&INITIAL_SHOTS, None)
            .copied()
            .unwrap_or(1024);
        let created = self.random.past_timestamp(HISTORY_DAYS);
        let qubits = self.random.uniform_int(2, 20) as u32;
        let depth = self.random.uniform_int(10, 100) as u32;
        let user_id = format!("user_{}", self.random.uniform_int(1000, 9999));

        let duration = match status {
            JobStatus::Completed | JobStatus::Failed => {
                Some(format_duration(self.random.uniform_int(10, 3600) as u64))
            }
            _ => None,
        };

        Job {
            id,
            status,
            backend,
            circuit_label,
            shots,
            created,
            duration,
            qubits,
            depth,
            user_id,
        }
    }

    fn generate_arrival_job(&mut self) -> Job {
        let id = self.random.short_id(JOB_ID_LENGTH);
        let backend = self.pick_backend();
        let circuit_label = self.pick_circuit();
        let shots = self
            .random
            .weighted_choice(&ARRIVAL_SHOTS, None)
            .copied()
            .unwrap_or(1024);
        let qubits = self.random.uniform_int(2, 15) as u32;
        let depth = self.random.uniform_int(10, 80) as u32;
        let user_id = format!("user_{}", self.random.uniform_int(1000, 9999));

        Job {
            id,
            status: JobStatus::Queued,
            backend,
            circuit_label,
            shots,
            created: self.clock.now(),
            duration: None,
            qubits,
            depth,
            user_id,
        }
    }

    fn pick_backend(&mut self) -> String {
        self.random
            .weighted_choice(&BACKEND_NAMES, None)
            .unwrap_or(&BACKEND_NAMES[0])
            .to_string()
    }

    fn pick_circuit(&mut self) -> String {
        self.random
            .weighted_choice(&CIRCUIT_LABELS, None)
            .unwrap_or(&CIRCUIT_LABELS[0])
            .to_string()
    }
}

fn validate_spec(spec: &JobSpec) -> Result<(), TrackerError> {
    if let Some(ref backend) = spec.backend {
        if backend.trim().is_empty() {
            return Err(TrackerError::Validation("backend cannot be empty".to_string()));
        }
    }
    for (field, value) in [("shots", spec.shots), ("qubits", spec.qubits), ("depth", spec.depth)] {
        if value == Some(0) {
            return Err(TrackerError::Validation(format!("{} must be positive", field)));
        }
    }
    Ok(())
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ===========================================================================
// Tests
// ===========================================================================
