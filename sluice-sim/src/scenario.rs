//! Seeded random interleavings of pump events.
//!
//! The driver plays the role of both segment source and media sink,
//! choosing at each step among the events that are legal at that point:
//! a new arrival, a readiness signal (possibly repeated), or completion
//! of the outstanding append. The resulting trace is checked against the
//! standard invariants.

use sluice_core::config::{SessionConfig, SimulationConfig};
use sluice_core::{AppendScheduler, PumpEvent, PumpStats};

use crate::SimulationError;
use crate::invariants::{InvariantViolation, check_all, standard_invariants};
use crate::rng::DeterministicRng;
use crate::trace::{RecordingSink, SessionTrace, TraceEvent, simulated_segment};

/// Upper bound on extra readiness signals injected per scenario.
const MAX_DUPLICATE_READIES: usize = 3;

/// Parameters for one interleaving run.
#[derive(Debug, Clone)]
pub struct InterleavingScenario {
    /// Seed driving every random choice
    pub seed: u64,
    /// Segments delivered by the simulated source
    pub segment_count: usize,
    /// Smallest segment payload in bytes
    pub min_segment_size: usize,
    /// Largest segment payload in bytes
    pub max_segment_size: usize,
    /// Chance of offering a repeated readiness signal at each step
    pub duplicate_ready_probability: f64,
}

impl InterleavingScenario {
    /// Creates a scenario with small payloads.
    pub fn new(seed: u64, segment_count: usize) -> Self {
        Self {
            seed,
            segment_count,
            min_segment_size: 16,
            max_segment_size: 256,
            duplicate_ready_probability: 0.1,
        }
    }

    /// Creates a scenario from simulation settings, drawing a seed if none is set.
    pub fn from_config(config: &SimulationConfig) -> Self {
        let seed = DeterministicRng::from_optional_seed(config.deterministic_seed).seed();
        Self {
            min_segment_size: config.min_segment_size,
            max_segment_size: config.max_segment_size,
            ..Self::new(seed, config.segment_count)
        }
    }

    /// Drives a scheduler through one random interleaving.
    ///
    /// # Errors
    ///
    /// - `SimulationError::Pump` - The scheduler rejected a legal event
    pub fn run(&self, session: &SessionConfig) -> Result<ScenarioReport, SimulationError> {
        let mut rng = DeterministicRng::from_seed(self.seed);
        let sink = RecordingSink::new();
        let mut scheduler = AppendScheduler::with_config(sink.clone(), session);

        let mut next_sequence = 0u64;
        let mut ready_sent = false;
        let mut duplicate_readies = 0usize;
        let mut actions = Vec::with_capacity(3);

        loop {
            actions.clear();
            if (next_sequence as usize) < self.segment_count {
                actions.push(Action::Arrive);
            }
            if sink.is_busy() {
                actions.push(Action::Complete);
            }
            if !ready_sent
                || (duplicate_readies < MAX_DUPLICATE_READIES
                    && rng.random_bool(self.duplicate_ready_probability))
            {
                actions.push(Action::Ready);
            }

            if actions.is_empty() {
                break;
            }

            let choice = rng.random_range(0, actions.len() as u64) as usize;
            match actions[choice] {
                Action::Arrive => {
                    let size = rng.random_range(
                        self.min_segment_size as u64,
                        self.max_segment_size as u64 + 1,
                    ) as usize;
                    let segment = simulated_segment(next_sequence, size, &mut rng);
                    sink.record(TraceEvent::Arrived(next_sequence));
                    next_sequence += 1;
                    scheduler.handle_event(PumpEvent::SegmentArrived(segment))?;
                }
                Action::Ready => {
                    if ready_sent {
                        duplicate_readies += 1;
                    }
                    ready_sent = true;
                    sink.record(TraceEvent::Ready);
                    scheduler.handle_event(PumpEvent::SinkBecameReady)?;
                }
                Action::Complete => {
                    sink.complete();
                    scheduler.handle_event(PumpEvent::AppendCompleted)?;
                }
            }
        }

        let trace = sink.trace();
        let violations = check_all(&standard_invariants(), &trace);
        tracing::debug!(
            seed = self.seed,
            events = trace.len(),
            violations = violations.len(),
            "Interleaving scenario finished"
        );

        Ok(ScenarioReport {
            seed: self.seed,
            stats: scheduler.stats(),
            trace,
            violations,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Arrive,
    Ready,
    Complete,
}

/// Outcome of one interleaving run.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    /// Seed that reproduces this run
    pub seed: u64,
    /// Final scheduler counters
    pub stats: PumpStats,
    /// Every event in order
    pub trace: SessionTrace,
    /// Invariants the trace broke
    pub violations: Vec<InvariantViolation>,
}

impl ScenarioReport {
    /// Returns true if no invariant was violated.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}
