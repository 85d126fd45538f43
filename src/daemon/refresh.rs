use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

use crate::daemon::events::TelemetryEvent;
use crate::errors::TrackerError;
use crate::models::{Job, JobFilter, Machine, Stats};
use crate::telemetry::TelemetryApi;

/// Read-only state handed to every subscriber for one render pass.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub stats: Stats,
    /// Newest first, as stored.
    pub jobs: Vec<Job>,
    pub recent_jobs: Vec<Job>,
    pub machines: Vec<Machine>,
    pub taken_at: DateTime<Utc>,
}

/// A view that re-renders itself from a snapshot.
#[async_trait]
pub trait Subscriber: Send + Sync {
    fn name(&self) -> &str;
    async fn render(&self, snapshot: &Snapshot) -> anyhow::Result<()>;
}

/// Which subscribers rendered and which failed during one pass.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RefreshReport {
    pub rendered: Vec<String>,
    pub failed: Vec<String>,
}

struct Listener {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Fans telemetry updates out to the registered view subscribers.
pub struct RefreshPipeline {
    api: Arc<dyn TelemetryApi>,
    subscribers: Vec<Arc<dyn Subscriber>>,
    recent_jobs: usize,
    listener: Mutex<Option<Listener>>,
}

impl RefreshPipeline {
    pub fn new(api: Arc<dyn TelemetryApi>, recent_jobs: usize) -> Self {
        Self {
            api,
            subscribers: Vec::new(),
            recent_jobs,
            listener: Mutex::new(None),
        }
    }

    /// Subscribers are invoked in registration order.
    pub fn register(&mut self, subscriber: Arc<dyn Subscriber>) {
        self.subscribers.push(subscriber);
    }

    pub fn subscriber_names(&self) -> Vec<String> {
        self.subscribers.iter().map(|s| s.name().to_string()).collect()
    }

    /// Begin reacting to events from `rx`. Returns `false` if already
    /// listening.
    pub async fn start(&self, mut rx: broadcast::Receiver<TelemetryEvent>) -> bool {
        let mut listener = self.listener.lock().await;
        if listener.is_some() {
            return false;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let api = Arc::clone(&self.api);
        let subscribers = self.subscribers.clone();
        let recent = self.recent_jobs;

        let handle = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = stop_rx.changed() => break,
                    received = rx.recv() => received,
                };

                let (stats, recent_jobs) = match event {
                    Ok(TelemetryEvent::TelemetryUpdated {
                        stats, recent_jobs, ..
                    }) => (Some(stats), Some(recent_jobs)),
                    Ok(TelemetryEvent::JobChanged { .. }) => (None, None),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Refresh pipeline lagged by {} events", n);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                match pull_snapshot(api.as_ref(), stats, recent_jobs, recent).await {
                    Ok(snapshot) => {
                        dispatch(&subscribers, Arc::new(snapshot)).await;
                    }
                    Err(e) => tracing::warn!("Skipping refresh, snapshot unavailable: {}", e),
                }
            }
            tracing::debug!("Refresh pipeline listener exited");
        });

        *listener = Some(Listener { stop_tx, handle });
        tracing::info!(subscribers = self.subscribers.len(), "Refresh pipeline started");
        true
    }

    /// Stop listening and wait for any in-flight pass to finish.
    pub async fn stop(&self) {
        let Some(listener) = self.listener.lock().await.take() else {
            return;
        };
        let _ = listener.stop_tx.send(true);
        if let Err(e) = listener.handle.await {
            tracing::error!("Refresh pipeline listener failed: {}", e);
        }
        tracing::info!("Refresh pipeline stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.listener.lock().await.is_some()
    }

    /// Render every subscriber against an already-built snapshot.
    pub async fn dispatch(&self, snapshot: Arc<Snapshot>) -> RefreshReport {
        dispatch(&self.subscribers, snapshot).await
    }

    /// Pull current state from the telemetry API and render it.
    pub async fn refresh_now(&self) -> Result<RefreshReport, TrackerError> {
        let snapshot = pull_snapshot(self.api.as_ref(), None, None, self.recent_jobs).await?;
        Ok(self.dispatch(Arc::new(snapshot)).await)
    }
}

async fn pull_snapshot(
    api: &dyn TelemetryApi,
    stats: Option<Stats>,
    recent_jobs: Option<Vec<Job>>,
    recent: usize,
) -> Result<Snapshot, TrackerError> {
    let stats = match stats {
        Some(stats) => stats,
        None => api.get_stats().await?,
    };
    let jobs = api.list_jobs(JobFilter::default()).await?;
    let machines = api.list_machines().await?;
    let recent_jobs = recent_jobs.unwrap_or_else(|| jobs.iter().take(recent).cloned().collect());

    Ok(Snapshot {
        stats,
        jobs,
        recent_jobs,
        machines,
        taken_at: Utc::now(),
    })
}

/// Spawn one task per subscriber, then collect the outcomes. An error or
/// panic in one subscriber is logged and does not affect the others.
async fn dispatch(subscribers: &[Arc<dyn Subscriber>], snapshot: Arc<Snapshot>) -> RefreshReport {
    let tasks: Vec<(String, JoinHandle<anyhow::Result<()>>)> = subscribers
        .iter()
        .map(|subscriber| {
            let subscriber = Arc::clone(subscriber);
            let snapshot = Arc::clone(&snapshot);
            let name = subscriber.name().to_string();
            let handle = tokio::spawn(async move { subscriber.render(&snapshot).await });
            (name, handle)
        })
        .collect();

    let mut report = RefreshReport::default();
    for (name, handle) in tasks {
        match handle.await {
            Ok(Ok(())) => report.rendered.push(name),
            Ok(Err(e)) => {
                tracing::warn!(subscriber = %name, "View render failed: {:#}", e);
                report.failed.push(name);
            }
            Err(e) => {
                tracing::error!(subscriber = %name, "View render panicked: {}", e);
                report.failed.push(name);
            }
        }
    }
    report
}
