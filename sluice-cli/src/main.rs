//! Sluice CLI - Command-line interface
//!
//! Runs simulated pump sessions and deterministic interleaving replays.

mod commands;

use clap::Parser;
use sluice_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "sluice")]
#[command(about = "Ordered segment delivery into single-slot media sinks")]
struct Cli {
    /// Console log level (the trace log on disk always captures everything)
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info, global = true)]
    log_level: CliLogLevel,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_tracing_level(), None)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    commands::handle_command(cli.command).await
}
