//! warden: single-instance graph database deployment controller.
//!
//! # Usage
//!
//! ```text
//! warden deploy                 # replace, wait for readiness, verify
//! warden monitor                # one health check (+ metrics when UP)
//! warden collect                # one metrics sample
//! warden status --records 5
//! warden stop
//! ```
//!
//! Progress is logged to stderr; summaries and status go to stdout.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "warden",
    about = "Deploy, verify and monitor a single graph database instance",
    version,
    propagate_version = true
)]
struct Cli {
    /// Configuration file (default: ./warden.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Container CLI to drive (docker, or a compatible binary such as podman)
    #[arg(long, global = true, default_value = "docker")]
    backend_binary: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace the instance, wait until it answers queries, and verify it.
    ///
    /// Exits 0 when deployed, 1 when the deployment failed.
    Deploy,
    /// Record one health check, plus a metrics sample when the instance is UP.
    ///
    /// Meant to be run from cron or a systemd timer.
    Monitor,
    /// Record one metrics sample if the instance is running.
    Collect,
    /// Stop and remove the instance.
    Stop,
    /// Show running state, port bindings and recent journal records.
    Status {
        /// Number of recent records to show from each log
        #[arg(short, long, default_value = "5")]
        records: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,warden=info")),
        )
        .init();

    let cli = Cli::parse();
    let ctx = commands::Context::load(cli.config.as_deref(), &cli.backend_binary)?;

    match cli.command {
        Commands::Deploy => commands::deploy::deploy(ctx).await,
        Commands::Monitor => commands::monitor::monitor(ctx).await,
        Commands::Collect => commands::collect::collect(ctx).await,
        Commands::Stop => commands::stop::stop(ctx).await,
        Commands::Status { records } => commands::status::status(ctx, records).await,
    }
}
