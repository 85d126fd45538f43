//! Dashboard view models and the subscribers that render them.
//!
//! Each view owns its model behind a lock and rewrites it wholesale on
//! every render. `DashboardViews` groups them for registration with the
//! refresh pipeline and for serving `/api/dashboard`.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Timelike, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::daemon::refresh::{Snapshot, Subscriber};
use crate::models::{Job, JobStatus};

const TIMELINE_HOURS: i64 = 24;

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// "Just now", "5m ago", "3h ago", "2d ago".
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    if secs < 60 {
        "Just now".to_string()
    } else if secs < 3_600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3_600)
    } else {
        format!("{}d ago", secs / 86_400)
    }
}

/// Relative time within the last day, otherwise the calendar date.
pub fn format_created(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if now - created < Duration::days(1) {
        time_ago(created, now)
    } else {
        created.format("%Y-%m-%d").to_string()
    }
}

pub fn activity_description(job: &Job) -> String {
    match job.status {
        JobStatus::Running => format!("Job {} is now running", job.id),
        JobStatus::Queued => format!("Job {} added to queue", job.id),
        JobStatus::Completed => format!("Job {} completed successfully", job.id),
        JobStatus::Failed => format!("Job {} failed to execute", job.id),
        JobStatus::Cancelled => format!("Job {} was cancelled", job.id),
    }
}

// ---------------------------------------------------------------------------
// Stat cards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatCards {
    pub running_jobs: usize,
    pub queued_jobs: usize,
    pub completed_jobs: usize,
    pub active_machines: usize,
    pub total_machines: usize,
    pub average_wait_time: f64,
    pub success_rate: f64,
}

#[derive(Default)]
pub struct StatCardsView {
    model: RwLock<Option<StatCards>>,
}

impl StatCardsView {
    pub async fn current(&self) -> Option<StatCards> {
        self.model.read().await.clone()
    }
}

#[async_trait]
impl Subscriber for StatCardsView {
    fn name(&self) -> &str {
        "stat_cards"
    }

    async fn render(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let stats = &snapshot.stats;
        *self.model.write().await = Some(StatCards {
            running_jobs: stats.running_jobs,
            queued_jobs: stats.queued_jobs,
            completed_jobs: stats.completed_jobs,
            active_machines: stats.active_machines,
            total_machines: stats.total_machines,
            average_wait_time: stats.average_wait_time,
            success_rate: stats.success_rate,
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Charts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SuccessGauge {
    pub success_rate: f64,
    pub failure_rate: f64,
}

/// Completed and failed counts for the success chart.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct JobOutcomes {
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Charts {
    pub status_distribution: Vec<ChartPoint>,
    /// Pending jobs per machine.
    pub machine_utilization: Vec<ChartPoint>,
    /// Pending jobs as a percentage of qubit count, capped at 100.
    pub utilization_percent: Vec<ChartPoint>,
    pub success_gauge: SuccessGauge,
    /// Held at the last non-empty value while no job has finished.
    pub job_outcomes: Option<JobOutcomes>,
    /// Oldest hour first; labels are `HH:00`.
    pub timeline: Vec<ChartPoint>,
}

#[derive(Default)]
pub struct ChartsView {
    model: RwLock<Option<Charts>>,
}

impl ChartsView {
    pub async fn current(&self) -> Option<Charts> {
        self.model.read().await.clone()
    }
}

fn hourly_timeline(jobs: &[Job], now: DateTime<Utc>) -> Vec<ChartPoint> {
    let current_hour = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);

    (0..TIMELINE_HOURS)
        .rev()
        .map(|hours_back| {
            let start = current_hour - Duration::hours(hours_back);
            let end = start + Duration::hours(1);
            let count = jobs
                .iter()
                .filter(|job| job.created >= start && job.created < end)
                .count();
            ChartPoint {
                label: format!("{:02}:00", start.hour()),
                value: count as f64,
            }
        })
        .collect()
}

/// One decimal place. A zero qubit count is treated as one.
fn percent_of_qubits(pending: u32, qubit_count: u32) -> f64 {
    let percent = f64::from(pending) / f64::from(qubit_count.max(1)) * 100.0;
    (percent.min(100.0) * 10.0).round() / 10.0
}

#[async_trait]
impl Subscriber for ChartsView {
    fn name(&self) -> &str {
        "charts"
    }

    async fn render(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let stats = &snapshot.stats;
        let status_distribution = [
            ("Running", stats.running_jobs),
            ("Queued", stats.queued_jobs),
            ("Completed", stats.completed_jobs),
            ("Failed", stats.failed_jobs),
            ("Cancelled", stats.cancelled_jobs),
        ]
        .into_iter()
        .map(|(label, count)| ChartPoint {
            label: label.to_string(),
            value: count as f64,
        })
        .collect();

        let machine_utilization = snapshot
            .machines
            .iter()
            .map(|m| ChartPoint {
                label: m.name.clone(),
                value: f64::from(m.pending),
            })
            .collect();

        let utilization_percent = snapshot
            .machines
            .iter()
            .map(|m| ChartPoint {
                label: m.name.clone(),
                value: percent_of_qubits(m.pending, m.qubit_count),
            })
            .collect();

        let job_outcomes = if stats.completed_jobs + stats.failed_jobs > 0 {
            Some(JobOutcomes {
                completed: stats.completed_jobs,
                failed: stats.failed_jobs,
            })
        } else {
            self.model
                .read()
                .await
                .as_ref()
                .and_then(|previous| previous.job_outcomes)
        };

        let success = stats.success_rate;
        let charts = Charts {
            status_distribution,
            machine_utilization,
            utilization_percent,
            success_gauge: SuccessGauge {
                success_rate: success,
                failure_rate: ((100.0 - success) * 10.0).round() / 10.0,
            },
            job_outcomes,
            timeline: hourly_timeline(&snapshot.jobs, snapshot.taken_at),
        };

        *self.model.write().await = Some(charts);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Activity feed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActivityItem {
    pub job_id: String,
    pub status: JobStatus,
    pub title: String,
    pub backend: String,
    pub circuit_label: String,
    pub shots: u32,
    pub created: DateTime<Utc>,
    pub time_ago: String,
}

impl ActivityItem {
    fn from_job(job: &Job, now: DateTime<Utc>) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            title: activity_description(job),
            backend: job.backend.clone(),
            circuit_label: job.circuit_label.clone(),
            shots: job.shots,
            created: job.created,
            time_ago: time_ago(job.created, now),
        }
    }
}

/// Newest-first feed of recent jobs, one item per job id.
pub struct ActivityFeedView {
    capacity: usize,
    items: RwLock<VecDeque<ActivityItem>>,
}

impl ActivityFeedView {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: RwLock::new(VecDeque::new()),
        }
    }

    pub async fn current(&self) -> Vec<ActivityItem> {
        self.items.read().await.iter().cloned().collect()
    }
}

#[async_trait]
impl Subscriber for ActivityFeedView {
    fn name(&self) -> &str {
        "activity_feed"
    }

    async fn render(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let now = snapshot.taken_at;
        let mut items = self.items.write().await;

        // Oldest first so the newest job ends up at the front.
        for job in snapshot.recent_jobs.iter().rev() {
            let item = ActivityItem::from_job(job, now);
            match items.iter_mut().find(|existing| existing.job_id == job.id) {
                Some(existing) => *existing = item,
                None => items.push_front(item),
            }
        }
        items.truncate(self.capacity);

        for item in items.iter_mut() {
            item.time_ago = time_ago(item.created, now);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Jobs table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobRow {
    pub id: String,
    pub status: JobStatus,
    pub backend: String,
    pub circuit_label: String,
    pub shots: u32,
    pub created: String,
    pub duration: String,
    pub cancellable: bool,
}

#[derive(Default)]
pub struct JobsTableView {
    rows: RwLock<Vec<JobRow>>,
}

impl JobsTableView {
    pub async fn current(&self) -> Vec<JobRow> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl Subscriber for JobsTableView {
    fn name(&self) -> &str {
        "jobs_table"
    }

    async fn render(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let now = snapshot.taken_at;
        let rows = snapshot
            .jobs
            .iter()
            .map(|job| JobRow {
                id: job.id.clone(),
                status: job.status,
                backend: job.backend.clone(),
                circuit_label: job.circuit_label.clone(),
                shots: job.shots,
                created: format_created(job.created, now),
                duration: job.duration.clone().unwrap_or_else(|| "-".to_string()),
                cancellable: !job.status.is_terminal(),
            })
            .collect();
        *self.rows.write().await = rows;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Machine cards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MachineCard {
    pub name: String,
    pub location: String,
    pub qubits: u32,
    pub queue: u32,
    pub fidelity: String,
    pub uptime: String,
    pub status: String,
    pub status_label: String,
}

#[derive(Default)]
pub struct MachineCardsView {
    cards: RwLock<Vec<MachineCard>>,
}

impl MachineCardsView {
    pub async fn current(&self) -> Vec<MachineCard> {
        self.cards.read().await.clone()
    }
}

#[async_trait]
impl Subscriber for MachineCardsView {
    fn name(&self) -> &str {
        "machine_cards"
    }

    async fn render(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let cards = snapshot
            .machines
            .iter()
            .map(|m| MachineCard {
                name: m.name.clone(),
                location: m.location.clone(),
                qubits: m.qubit_count,
                queue: m.pending,
                fidelity: format!("{:.1}%", m.fidelity),
                uptime: format!("{:.1}%", m.uptime),
                status: m.status.as_str().to_string(),
                status_label: m.status.label().to_string(),
            })
            .collect();
        *self.cards.write().await = cards;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DashboardViews
// ---------------------------------------------------------------------------

/// Everything `/api/dashboard` returns.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub stat_cards: Option<StatCards>,
    pub charts: Option<Charts>,
    pub activity: Vec<ActivityItem>,
    pub jobs_table: Vec<JobRow>,
    pub machine_cards: Vec<MachineCard>,
}

pub struct DashboardViews {
    pub stat_cards: Arc<StatCardsView>,
    pub charts: Arc<ChartsView>,
    pub activity: Arc<ActivityFeedView>,
    pub jobs_table: Arc<JobsTableView>,
    pub machine_cards: Arc<MachineCardsView>,
}

impl DashboardViews {
    pub fn new(activity_capacity: usize) -> Self {
        Self {
            stat_cards: Arc::new(StatCardsView::default()),
            charts: Arc::new(ChartsView::default()),
            activity: Arc::new(ActivityFeedView::new(activity_capacity)),
            jobs_table: Arc::new(JobsTableView::default()),
            machine_cards: Arc::new(MachineCardsView::default()),
        }
    }

    /// In the order they should be registered with the pipeline.
    pub fn subscribers(&self) -> Vec<Arc<dyn Subscriber>> {
        vec![
            self.stat_cards.clone() as Arc<dyn Subscriber>,
            self.charts.clone() as Arc<dyn Subscriber>,
            self.activity.clone() as Arc<dyn Subscriber>,
            self.jobs_table.clone() as Arc<dyn Subscriber>,
            self.machine_cards.clone() as Arc<dyn Subscriber>,
        ]
    }

    pub async fn current(&self) -> Dashboard {
        Dashboard {
            stat_cards: self.stat_cards.current().await,
            charts: self.charts.current().await,
            activity: self.activity.current().await,
            jobs_table: self.jobs_table.current().await,
            machine_cards: self.machine_cards.current().await,
        }
    }
}
