use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::daemon::events::TelemetryEvent;
use crate::telemetry::TelemetryApi;

struct Running {
    stop_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

/// Drives the simulation with two independent timers.
///
/// The fast tick advances job statuses and machine gauges, then publishes
/// a `TelemetryUpdated` event. The slow tick rolls for a new arrival. The
/// scheduler holds no telemetry state of its own.
pub struct UpdateScheduler {
    api: Arc<dyn TelemetryApi>,
    event_tx: broadcast::Sender<TelemetryEvent>,
    fast_tick: Duration,
    slow_tick: Duration,
    recent_jobs: usize,
    running: Option<Running>,
}

impl UpdateScheduler {
    pub fn new(
        api: Arc<dyn TelemetryApi>,
        event_tx: broadcast::Sender<TelemetryEvent>,
        fast_tick: Duration,
        slow_tick: Duration,
        recent_jobs: usize,
    ) -> Self {
        Self {
            api,
            event_tx,
            fast_tick,
            slow_tick,
            recent_jobs,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Spawn both timer tasks. Returns `false` if already started or if
    /// either period is zero.
    pub fn start(&mut self) -> bool {
        if self.running.is_some() {
            return false;
        }
        if self.fast_tick.is_zero() || self.slow_tick.is_zero() {
            tracing::error!(
                fast_tick_ms = self.fast_tick.as_millis() as u64,
                slow_tick_ms = self.slow_tick.as_millis() as u64,
                "Update scheduler not started: tick periods must be non-zero"
            );
            return false;
        }

        let (stop_tx, stop_rx) = watch::channel(false);

        let api = Arc::clone(&self.api);
        let event_tx = self.event_tx.clone();
        let recent = self.recent_jobs;
        let fast = spawn_timer("fast", self.fast_tick, stop_rx.clone(), move || {
            let api = Arc::clone(&api);
            let event_tx = event_tx.clone();
            async move { fast_tick(api.as_ref(), &event_tx, recent).await }
        });

        let api = Arc::clone(&self.api);
        let slow = spawn_timer("slow", self.slow_tick, stop_rx, move || {
            let api = Arc::clone(&api);
            async move { slow_tick(api.as_ref()).await }
        });

        self.running = Some(Running {
            stop_tx,
            handles: vec![fast, slow],
        });
        tracing::info!(
            fast_tick_ms = self.fast_tick.as_millis() as u64,
            slow_tick_ms = self.slow_tick.as_millis() as u64,
            "Update scheduler started"
        );
        true
    }

    /// Cancel both timers and wait for their tasks to exit.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let _ = running.stop_tx.send(true);
        for handle in running.handles {
            if let Err(e) = handle.await {
                tracing::error!("Scheduler timer task failed: {}", e);
            }
        }
        tracing::info!("Update scheduler stopped");
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.stop_tx.send(true);
        }
    }
}

/// Run `step` every `period`, first firing one period after start.
fn spawn_timer<F, Fut>(
    label: &'static str,
    period: Duration,
    mut stop_rx: watch::Receiver<bool>,
    mut step: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stop_rx.changed() => break,
                _ = interval.tick() => step().await,
            }
        }
        tracing::debug!(timer = label, "Timer exited");
    })
}

/// Each step is isolated: a failure is logged and the rest still run.
pub async fn fast_tick(
    api: &dyn TelemetryApi,
    event_tx: &broadcast::Sender<TelemetryEvent>,
    recent: usize,
) {
    match api.tick_statuses().await {
        Ok(changed) if changed > 0 => tracing::debug!(changed, "Job statuses advanced"),
        Ok(_) => {}
        Err(e) => tracing::warn!("Status tick failed: {}", e),
    }

    if let Err(e) = api.tick_machines().await {
        tracing::warn!("Machine tick failed: {}", e);
    }

    match api.snapshot(recent).await {
        Ok((stats, recent_jobs)) => {
            let event = TelemetryEvent::TelemetryUpdated {
                stats,
                recent_jobs,
                timestamp: Utc::now(),
            };
            if event_tx.send(event).is_err() {
                tracing::trace!("No subscribers for telemetry update");
            }
        }
        Err(e) => tracing::warn!("Skipping telemetry update: {}", e),
    }
}

pub async fn slow_tick(api: &dyn TelemetryApi) {
    match api.tick_arrivals().await {
        Ok(Some(job)) => tracing::debug!(job_id = %job.id, backend = %job.backend, "New job arrived"),
        Ok(None) => {}
        Err(e) => tracing::warn!("Arrival tick failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobFilter, LatencyConfig, TrackerConfig};
    use crate::telemetry::MockTelemetry;

    fn config() -> Arc<TrackerConfig> {
        Arc::new(TrackerConfig {
            seed: Some(21),
            latency: LatencyConfig::none(),
            ..TrackerConfig::default()
        })
    }

    #[tokio::test]
    async fn test_fast_tick_publishes_update() {
        let api = MockTelemetry::new(config());
        api.initialize().await.unwrap();
        let (tx, mut rx) = broadcast::channel(8);

        fast_tick(&api, &tx, 10).await;

        match rx.try_recv().expect("event published") {
            TelemetryEvent::TelemetryUpdated {
                stats, recent_jobs, ..
            } => {
                assert_eq!(recent_jobs.len(), 10);
                assert_eq!(stats.total_machines, 8);
            }
            other => panic!("Expected TelemetryUpdated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fast_tick_before_initialize_publishes_nothing() {
        let api = MockTelemetry::new(config());
        let (tx, mut rx) = broadcast::channel(8);

        fast_tick(&api, &tx, 10).await;
        slow_tick(&api).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_slow_tick_adds_arrival() {
        let api = MockTelemetry::new(Arc::new(TrackerConfig {
            arrival_chance: 1.0,
            initial_jobs: 0,
            latency: LatencyConfig::none(),
            ..TrackerConfig::default()
        }));
        api.initialize().await.unwrap();

        slow_tick(&api).await;
        assert_eq!(api.list_jobs(JobFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_clears() {
        let api: Arc<dyn TelemetryApi> = Arc::new(MockTelemetry::new(config()));
        let (tx, _rx) = broadcast::channel(8);
        let mut scheduler = UpdateScheduler::new(
            api,
            tx,
            Duration::from_secs(5),
            Duration::from_secs(10),
            10,
        );

        assert!(!scheduler.is_running());
        assert!(scheduler.start());
        assert!(!scheduler.start());
        assert!(scheduler.is_running());

        scheduler.stop().await;
        assert!(!scheduler.is_running());
        // Stopping twice is harmless.
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_start_refuses_zero_period() {
        let zero_fast: TrackerConfig = serde_json::from_str(r#"{"fast_tick_ms": 0}"#).unwrap();
        let api: Arc<dyn TelemetryApi> = Arc::new(MockTelemetry::new(config()));
        let (tx, _rx) = broadcast::channel(8);

        let mut scheduler = UpdateScheduler::new(
            Arc::clone(&api),
            tx.clone(),
            zero_fast.fast_tick(),
            zero_fast.slow_tick(),
            10,
        );
        assert!(!scheduler.start());
        assert!(!scheduler.is_running());

        let mut scheduler =
            UpdateScheduler::new(api, tx, Duration::from_secs(5), Duration::ZERO, 10);
        assert!(!scheduler.start());
    }
}
