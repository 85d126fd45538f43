use clap::Parser;
use tracing_subscriber::EnvFilter;

use quantum_jobs_tracker::cli::{self, Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // The server logs at info by default; client commands stay quiet unless -v.
    let default_level = if cli.verbose {
        Some("debug")
    } else if matches!(cli.command, Some(Commands::Serve { .. })) {
        Some("info")
    } else {
        None
    };
    if let Some(level) = default_level {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    if let Err(e) = cli::dispatch(&cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
