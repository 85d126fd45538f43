pub mod events;
pub mod refresh;
pub mod scheduler;
pub mod views;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::daemon::scheduler::UpdateScheduler;
use crate::models::{LatencyConfig, TrackerConfig};
use crate::server::{self, AppState};
use crate::telemetry::{MockTelemetry, TelemetryApi};

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

fn read_config(path: &Path) -> Result<TrackerConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: TrackerConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    tracing::info!("Loaded config from: {}", path.display());
    Ok(config)
}

/// Load the TrackerConfig, first match wins:
///   1. --config CLI flag (passed as config_path)
///   2. QJT_CONFIG_DIR environment variable
///   3. Platform config dir (dirs::config_dir()/quantum-jobs-tracker/config.json)
///   4. TrackerConfig::default()
pub fn load_config(config_path: Option<&Path>) -> Result<TrackerConfig> {
    if let Some(path) = config_path {
        if path.exists() {
            return read_config(path);
        }
        return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
    }

    if let Ok(config_dir) = std::env::var("QJT_CONFIG_DIR") {
        let path = PathBuf::from(&config_dir).join("config.json");
        if path.exists() {
            return read_config(&path);
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let path = config_dir.join("quantum-jobs-tracker").join("config.json");
        if path.exists() {
            return read_config(&path);
        }
    }

    tracing::info!("No config file found, using defaults");
    Ok(TrackerConfig::default())
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

/// Command-line overrides applied on top of the loaded config.
#[derive(Debug, Default, Clone)]
pub struct ServeOptions {
    pub config_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub seed: Option<u64>,
    pub initial_jobs: Option<usize>,
    pub no_latency: bool,
}

impl ServeOptions {
    pub fn apply(&self, config: &mut TrackerConfig) {
        if let Some(ref h) = self.host {
            config.host = h.clone();
        }
        if let Some(p) = self.port {
            config.port = p;
        }
        if let Some(s) = self.seed {
            config.seed = Some(s);
        }
        if let Some(n) = self.initial_jobs {
            config.initial_jobs = n;
        }
        if self.no_latency {
            config.latency = LatencyConfig::none();
        }
    }
}

/// Run the tracker in the foreground.
///
/// Initializes telemetry, starts the update scheduler and the refresh
/// pipeline, serves HTTP until Ctrl+C or SIGTERM, then stops the scheduler,
/// the pipeline and finally the server.
pub async fn run_server(options: ServeOptions) -> Result<()> {
    let mut config = load_config(options.config_path.as_deref())?;
    options.apply(&mut config);
    config.validate().context("Invalid configuration")?;
    let config = Arc::new(config);

    let api: Arc<dyn TelemetryApi> = Arc::new(MockTelemetry::new(Arc::clone(&config)));
    api.initialize()
        .await
        .context("Failed to initialize telemetry")?;

    let state = Arc::new(AppState::new(Arc::clone(&api), Arc::clone(&config)));

    state.pipeline.start(state.event_tx.subscribe()).await;
    if let Err(e) = state.pipeline.refresh_now().await {
        tracing::warn!("Initial dashboard render failed: {}", e);
    }

    let mut scheduler = UpdateScheduler::new(
        Arc::clone(&api),
        state.event_tx.clone(),
        config.fast_tick(),
        config.slow_tick(),
        config.recent_jobs,
    );
    scheduler.start();

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(());

    let router = server::create_router(Arc::clone(&state));
    let bind_addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    tracing::info!("Quantum jobs tracker listening on http://{}", bind_addr);
    tracing::info!("Press Ctrl+C to stop.");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
                tracing::info!("HTTP server received shutdown signal");
            })
            .await
            .ok();
    });

    wait_for_signal().await?;

    scheduler.stop().await;
    state.pipeline.stop().await;
    let _ = shutdown_tx.send(());
    let _ = server_handle.await;

    tracing::info!("Tracker exited cleanly.");
    Ok(())
}

async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C signal");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM signal");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl+C signal");
    }
    Ok(())
}
