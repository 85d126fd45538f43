use std::path::PathBuf;

use crate::daemon::{self, ServeOptions};

/// qjt serve
pub async fn cmd_serve(
    host: Option<&str>,
    port: Option<u16>,
    config: Option<&str>,
    seed: Option<u64>,
    initial_jobs: Option<usize>,
    no_latency: bool,
) -> anyhow::Result<()> {
    let options = ServeOptions {
        config_path: config.map(PathBuf::from),
        host: host.map(str::to_string),
        port,
        seed,
        initial_jobs,
        no_latency,
    };
    daemon::run_server(options).await
}
