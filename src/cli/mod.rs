pub mod jobs;
pub mod serve;
pub mod watch;

use clap::{Parser, Subcommand};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8377;

/// Quantum Jobs Tracker - simulated quantum job and backend telemetry
#[derive(Parser, Debug)]
#[command(
    name = "qjt",
    version,
    about = "Quantum Jobs Tracker - simulated quantum job and backend telemetry"
)]
pub struct Cli {
    /// Server host (bind address for `serve`)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Server port (listen port for `serve`)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the tracker in the foreground
    Serve {
        /// Path to configuration file
        #[arg(short = 'c', long = "config")]
        config: Option<String>,

        /// Seed for deterministic telemetry
        #[arg(long)]
        seed: Option<u64>,

        /// Number of jobs generated at startup
        #[arg(long = "initial-jobs")]
        initial_jobs: Option<usize>,

        /// Disable simulated API latency
        #[arg(long = "no-latency")]
        no_latency: bool,
    },

    /// Show aggregate job and machine statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List jobs, newest first
    Jobs {
        /// Only jobs with this status
        #[arg(short = 's', long)]
        status: Option<String>,

        /// Only jobs on this backend
        #[arg(short = 'b', long)]
        backend: Option<String>,

        /// Case-insensitive match on id, backend or status
        #[arg(long)]
        search: Option<String>,

        /// Maximum number of jobs
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a single job
    Job {
        /// Job id
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List backend machines
    Machines {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Submit a new job
    Submit {
        /// Target backend (random when omitted)
        #[arg(short = 'b', long)]
        backend: Option<String>,

        /// Circuit label
        #[arg(long)]
        circuit: Option<String>,

        /// Number of shots
        #[arg(long)]
        shots: Option<u32>,

        /// Number of qubits
        #[arg(long)]
        qubits: Option<u32>,

        /// Circuit depth
        #[arg(long)]
        depth: Option<u32>,

        /// Submitting user id
        #[arg(long)]
        user: Option<String>,
    },

    /// Cancel a queued or running job
    Cancel {
        /// Job id
        id: String,
    },

    /// Stream live telemetry events
    Watch {
        /// Only show job changes for this job id
        #[arg(long)]
        job: Option<String>,
    },
}

/// Build the base URL for the tracker HTTP API.
pub fn base_url(host: &str, port: u16) -> String {
    format!("http://{}:{}", host, port)
}

/// Format a connection error message for when the server is not reachable.
pub fn connection_error_message(host: &str, port: u16) -> String {
    format!(
        "Could not connect to tracker at {}:{}. Is it running? (try: qjt serve)",
        host, port
    )
}

/// Helper to handle reqwest errors and produce a user-friendly connection error.
pub fn handle_request_error(err: reqwest::Error, host: &str, port: u16) -> anyhow::Error {
    if err.is_connect() || err.is_timeout() {
        anyhow::anyhow!("{}", connection_error_message(host, port))
    } else {
        anyhow::anyhow!("Request failed: {}", err)
    }
}

/// Dispatch the CLI command to the appropriate handler.
pub async fn dispatch(cli: &Cli) -> anyhow::Result<()> {
    let (host, port) = (cli.host(), cli.port());
    match &cli.command {
        Some(Commands::Serve {
            config,
            seed,
            initial_jobs,
            no_latency,
        }) => {
            serve::cmd_serve(
                cli.host.as_deref(),
                cli.port,
                config.as_deref(),
                *seed,
                *initial_jobs,
                *no_latency,
            )
            .await
        }
        Some(Commands::Stats { json }) => jobs::cmd_stats(host, port, *json).await,
        Some(Commands::Jobs {
            status,
            backend,
            search,
            limit,
            json,
        }) => {
            let query = jobs::JobsQuery {
                status: status.as_deref(),
                backend: backend.as_deref(),
                search: search.as_deref(),
                limit: *limit,
            };
            jobs::cmd_jobs(host, port, &query, *json).await
        }
        Some(Commands::Job { id, json }) => jobs::cmd_job(host, port, id, *json).await,
        Some(Commands::Machines { json }) => jobs::cmd_machines(host, port, *json).await,
        Some(Commands::Submit {
            backend,
            circuit,
            shots,
            qubits,
            depth,
            user,
        }) => {
            let spec = crate::models::JobSpec {
                backend: backend.clone(),
                circuit_label: circuit.clone(),
                shots: *shots,
                qubits: *qubits,
                depth: *depth,
                user_id: user.clone(),
            };
            jobs::cmd_submit(host, port, &spec).await
        }
        Some(Commands::Cancel { id }) => jobs::cmd_cancel(host, port, id).await,
        Some(Commands::Watch { job }) => watch::cmd_watch(host, port, job.as_deref()).await,
        None => {
            // No subcommand provided -- print help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}
