//! CLI command implementations

use std::time::Duration;

use anyhow::{Context, bail};
use clap::Subcommand;
use sluice_core::SluiceConfig;
use sluice_sim::{InterleavingScenario, run_simulated_session};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a session between a simulated source and a simulated sink
    Simulate {
        /// Number of segments the source emits
        #[arg(short = 'n', long)]
        segments: Option<usize>,
        /// Seed for segment sizes and payloads
        #[arg(long)]
        seed: Option<u64>,
        /// Delay before the sink reports ready, in milliseconds
        #[arg(long)]
        open_delay_ms: Option<u64>,
        /// Time the sink takes to accept one append, in milliseconds
        #[arg(long)]
        append_latency_ms: Option<u64>,
        /// Gap between source segments, in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay seeded random event interleavings and check every invariant
    Replay {
        /// First seed to replay
        #[arg(long, default_value = "0")]
        seed: u64,
        /// Number of consecutive seeds to replay
        #[arg(long, default_value = "1")]
        runs: u64,
        /// Segments delivered per run
        #[arg(short = 'n', long, default_value = "32")]
        segments: usize,
        /// Print every trace event
        #[arg(short, long)]
        verbose: bool,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Simulate {
            segments,
            seed,
            open_delay_ms,
            append_latency_ms,
            interval_ms,
            json,
        } => {
            let mut config = SluiceConfig::from_env();
            if let Some(segments) = segments {
                config.simulation.segment_count = segments;
            }
            if seed.is_some() {
                config.simulation.deterministic_seed = seed;
            }
            if let Some(ms) = open_delay_ms {
                config.simulation.sink_open_delay = Duration::from_millis(ms);
            }
            if let Some(ms) = append_latency_ms {
                config.simulation.append_latency = Duration::from_millis(ms);
            }
            if let Some(ms) = interval_ms {
                config.simulation.segment_interval = Duration::from_millis(ms);
            }
            simulate(config, json).await
        }
        Commands::Replay {
            seed,
            runs,
            segments,
            verbose,
        } => replay(seed, runs, segments, verbose),
    }
}

/// Run one simulated session end to end
///
/// # Errors
/// - Session terminated early or configuration was invalid
/// - Sink accepted segments out of order
pub async fn simulate(config: SluiceConfig, json: bool) -> anyhow::Result<()> {
    let report = run_simulated_session(&config)
        .await
        .context("simulated session failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let stats = &report.stats;
        println!("Simulated session (seed {})", report.seed);
        println!("{:-<60}", "");
        println!("Segments appended:  {}", stats.segments_appended);
        println!(
            "Bytes appended:     {:.2} MB",
            stats.bytes_appended as f64 / 1_048_576.0
        );
        println!("Peak queue depth:   {}", stats.peak_queue_depth);
        println!("Elapsed:            {:?}", report.elapsed);
    }

    if !report.delivered_in_order() {
        bail!("sink accepted segments out of order: {:?}", report.accepted);
    }
    Ok(())
}

/// Replay a range of seeded interleavings
///
/// # Errors
/// - Any run violated a pump invariant
pub fn replay(first_seed: u64, runs: u64, segments: usize, verbose: bool) -> anyhow::Result<()> {
    let session = SluiceConfig::from_env().session;
    let mut failed = 0u64;

    for seed in first_seed..first_seed.saturating_add(runs) {
        let report = InterleavingScenario::new(seed, segments).run(&session)?;

        if verbose {
            for (index, event) in report.trace.events().iter().enumerate() {
                println!("  [{index:>4}] {event:?}");
            }
        }

        if report.is_clean() {
            println!(
                "seed {seed}: ok ({} events, peak queue {})",
                report.trace.len(),
                report.stats.peak_queue_depth
            );
        } else {
            failed += 1;
            for violation in &report.violations {
                println!("seed {seed}: {violation}");
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {runs} replays violated pump invariants");
    }
    Ok(())
}
