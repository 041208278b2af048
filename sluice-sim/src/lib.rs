//! Sluice Simulation Framework - Deterministic testing for segment pumps.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
//!
//! Two ways to exercise a pump under controlled conditions:
//!
//! - **Interleaving scenarios**: a seeded driver plays source and sink
//!   against an [`AppendScheduler`](sluice_core::AppendScheduler) directly,
//!   choosing a random legal event at every step. The recorded trace is
//!   checked against the pump invariants (ordering, single in-flight
//!   append, readiness gating, no loss). Same seed, same trace.
//! - **Simulated sessions**: a real session actor runs between a timed
//!   source task and a timed sink task, end to end through the async
//!   runtime.
//!
//! # Example
//!
//! ```rust
//! use sluice_core::config::SessionConfig;
//! use sluice_sim::InterleavingScenario;
//!
//! let report = InterleavingScenario::new(12345, 32)
//!     .run(&SessionConfig::default())
//!     .unwrap();
//! assert!(report.is_clean());
//! ```

pub mod invariants;
pub mod rng;
pub mod scenario;
pub mod simulated;
pub mod trace;

pub use invariants::{
    Invariant, InvariantViolation, NoLossInvariant, OrderingInvariant, ReadinessGateInvariant,
    SingleInFlightInvariant, check_all, standard_invariants,
};
pub use rng::DeterministicRng;
pub use scenario::{InterleavingScenario, ScenarioReport};
pub use simulated::{SimulatedSink, SimulatedSource, SimulationReport, run_simulated_session};
pub use trace::{RecordingSink, SessionTrace, TraceEvent, segment_sequence, simulated_segment};

use sluice_core::{PumpError, SessionError};

/// Errors raised while running a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// Scheduler rejected an event the driver considered legal
    #[error("Pump error: {0}")]
    Pump(#[from] PumpError),

    /// Session actor stopped or failed
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Simulation settings failed validation
    #[error("Invalid simulation configuration: {reason}")]
    InvalidConfiguration {
        /// Why the settings were rejected
        reason: String,
    },

    /// A simulated collaborator task panicked
    #[error("Simulation task failed: {reason}")]
    TaskFailed {
        /// Join error reported by the runtime
        reason: String,
    },
}
