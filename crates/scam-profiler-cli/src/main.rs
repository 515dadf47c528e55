//! scam-profiler CLI
//!
//! Thin wrapper over scam-profiler-core: reads a batch, runs the
//! clustering + consensus pipeline against the configured external
//! classifier, and writes artifacts.
//!
//! # Commands
//!
//! - `run`: full pipeline over an NDJSON/JSON batch
//! - `redact`: standalone PII masking pass over a batch
//!
//! Failures surface as a structured `{error, category}` JSON line on
//! stderr with exit code 1; details go to tracing.

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod error;

/// Scam Profiler - persona clustering and cross-source consensus
#[derive(Parser)]
#[command(name = "scam-profiler")]
#[command(version = "0.1.0")]
#[command(about = "Cluster fraud message corpora into personas and reconcile with external archetypes")]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline over a batch file
    Run(commands::run::RunArgs),
    /// Redact PII from a batch file without running the pipeline
    Redact(commands::redact::RedactArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args).await,
        Commands::Redact(args) => commands::redact::execute(args),
    };

    if let Err(err) = result {
        error::emit(&err);
        std::process::exit(1);
    }
}
