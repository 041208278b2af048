//! Asynchronous simulated source and sink around a real session actor.

use std::time::{Duration, Instant};

use sluice_core::config::{SimulationConfig, SluiceConfig};
use sluice_core::sink::ChannelSink;
use sluice_core::{PumpStats, Segment, SessionHandle, spawn_session};
use tokio::sync::mpsc;

use crate::SimulationError;
use crate::rng::DeterministicRng;
use crate::trace::{segment_sequence, simulated_segment};

/// Media sink stand-in that opens after a delay and takes a fixed time
/// to accept each append.
#[derive(Debug, Clone)]
pub struct SimulatedSink {
    /// Delay before the sink reports ready
    pub open_delay: Duration,
    /// Time taken to accept one append
    pub append_latency: Duration,
}

impl SimulatedSink {
    /// Creates a sink with the timings from `config`.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            open_delay: config.sink_open_delay,
            append_latency: config.append_latency,
        }
    }

    /// Consumes appended segments until the session drops its sink.
    ///
    /// Returns the sequence numbers in the order they were accepted.
    pub async fn run(
        self,
        handle: SessionHandle,
        mut appended: mpsc::UnboundedReceiver<Segment>,
    ) -> Vec<u64> {
        let mut accepted = Vec::new();

        tokio::time::sleep(self.open_delay).await;
        if handle.sink_ready().is_err() {
            return accepted;
        }

        while let Some(segment) = appended.recv().await {
            tokio::time::sleep(self.append_latency).await;
            if let Some(sequence) = segment_sequence(&segment) {
                accepted.push(sequence);
            }
            if handle.append_completed().is_err() {
                break;
            }
        }

        accepted
    }
}

/// Segment source stand-in emitting numbered segments at a fixed interval.
#[derive(Debug)]
pub struct SimulatedSource {
    rng: DeterministicRng,
    segment_count: usize,
    min_segment_size: usize,
    max_segment_size: usize,
    interval: Duration,
}

impl SimulatedSource {
    /// Creates a source from `config`, seeded by `rng`.
    pub fn from_config(config: &SimulationConfig, rng: DeterministicRng) -> Self {
        Self {
            rng,
            segment_count: config.segment_count,
            min_segment_size: config.min_segment_size,
            max_segment_size: config.max_segment_size,
            interval: config.segment_interval,
        }
    }

    /// Delivers every segment to the session.
    ///
    /// # Errors
    ///
    /// - `SimulationError::Session` - Session stopped before all segments were sent
    pub async fn run(mut self, handle: &SessionHandle) -> Result<u64, SimulationError> {
        let mut bytes_sent = 0u64;
        for sequence in 0..self.segment_count as u64 {
            if !self.interval.is_zero() {
                tokio::time::sleep(self.interval).await;
            }
            let size = self.rng.random_range(
                self.min_segment_size as u64,
                self.max_segment_size as u64 + 1,
            ) as usize;
            let segment = simulated_segment(sequence, size, &mut self.rng);
            bytes_sent += segment.len() as u64;
            handle.segment_arrived(segment)?;
        }
        tracing::debug!(segments = self.segment_count, bytes_sent, "Source finished");
        Ok(bytes_sent)
    }
}

/// Outcome of an end-to-end simulated session.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SimulationReport {
    /// Seed that reproduces the segment payloads
    pub seed: u64,
    /// Final counters of the session
    pub stats: PumpStats,
    /// Sequence numbers in the order the sink accepted them
    pub accepted: Vec<u64>,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl SimulationReport {
    /// Returns true if the sink accepted every segment exactly once, in order.
    pub fn delivered_in_order(&self) -> bool {
        self.accepted
            .iter()
            .copied()
            .eq(0..self.stats.segments_received)
    }
}

/// Runs a session actor between a simulated source and sink until every
/// segment has been accepted.
///
/// # Errors
///
/// - `SimulationError::InvalidConfiguration` - Settings failed validation
/// - `SimulationError::Session` - The session terminated early
/// - `SimulationError::TaskFailed` - The sink task panicked
pub async fn run_simulated_session(
    config: &SluiceConfig,
) -> Result<SimulationReport, SimulationError> {
    config
        .validate()
        .map_err(|e| SimulationError::InvalidConfiguration {
            reason: e.to_string(),
        })?;

    let started = Instant::now();
    let rng = DeterministicRng::from_optional_seed(config.simulation.deterministic_seed);
    let seed = rng.seed();

    let (sink, appended) = ChannelSink::new();
    let (handle, session) = spawn_session(&config.session, sink);
    tracing::info!(session = %handle.id(), seed, "Starting simulated session");

    let sink_task = tokio::spawn(
        SimulatedSink::from_config(&config.simulation).run(handle.clone(), appended),
    );

    SimulatedSource::from_config(&config.simulation, rng)
        .run(&handle)
        .await?;
    handle.wait_drained().await?;
    handle.shutdown().await?;

    let stats = session.join().await?;
    let accepted = sink_task
        .await
        .map_err(|e| SimulationError::TaskFailed {
            reason: e.to_string(),
        })?;

    let report = SimulationReport {
        seed,
        stats,
        accepted,
        elapsed: started.elapsed(),
    };
    tracing::info!(
        segments = report.stats.segments_appended,
        bytes = report.stats.bytes_appended,
        peak_queue_depth = report.stats.peak_queue_depth,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Simulated session finished"
    );
    Ok(report)
}
