//! Invariant checking framework for session traces.

use std::collections::HashSet;
use std::fmt;

use crate::trace::{SessionTrace, TraceEvent};

/// Violation of a session invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    /// Name of the violated invariant
    pub invariant: String,
    /// Detailed description of the violation
    pub description: String,
    /// Index into the trace where the violation was detected
    pub event_index: Option<usize>,
}

impl InvariantViolation {
    fn new(invariant: &str, description: String, event_index: Option<usize>) -> Self {
        Self {
            invariant: invariant.to_string(),
            description,
            event_index,
        }
    }
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.event_index {
            Some(index) => write!(
                f,
                "Invariant '{}' violated at event {}: {}",
                self.invariant, index, self.description
            ),
            None => write!(f, "Invariant '{}' violated: {}", self.invariant, self.description),
        }
    }
}

/// Trait for checking invariants over a recorded session.
pub trait Invariant: Send + Sync {
    /// Checks if invariant holds for the trace.
    ///
    /// # Errors
    /// Returns `InvariantViolation` if the invariant condition is not met.
    fn check(&self, trace: &SessionTrace) -> Result<(), InvariantViolation>;

    /// Returns name of this invariant.
    fn name(&self) -> &str;
}

/// Appended sequence must be a prefix of the arrival sequence.
pub struct OrderingInvariant;

impl Invariant for OrderingInvariant {
    fn check(&self, trace: &SessionTrace) -> Result<(), InvariantViolation> {
        let mut arrived = Vec::new();
        let mut appended = 0usize;

        for (index, event) in trace.events().iter().enumerate() {
            match *event {
                TraceEvent::Arrived(sequence) => arrived.push(sequence),
                TraceEvent::Appended(sequence) => {
                    match arrived.get(appended) {
                        Some(&expected) if expected == sequence => {}
                        Some(&expected) => {
                            return Err(InvariantViolation::new(
                                self.name(),
                                format!("appended segment {sequence}, expected {expected}"),
                                Some(index),
                            ));
                        }
                        None => {
                            return Err(InvariantViolation::new(
                                self.name(),
                                format!("appended segment {sequence} before it arrived"),
                                Some(index),
                            ));
                        }
                    }
                    appended += 1;
                }
                TraceEvent::Ready | TraceEvent::Completed => {}
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "Ordering"
    }
}

/// No two appends without an intervening completion, and no completion
/// without an outstanding append.
pub struct SingleInFlightInvariant;

impl Invariant for SingleInFlightInvariant {
    fn check(&self, trace: &SessionTrace) -> Result<(), InvariantViolation> {
        let mut in_flight = false;

        for (index, event) in trace.events().iter().enumerate() {
            match event {
                TraceEvent::Appended(sequence) if in_flight => {
                    return Err(InvariantViolation::new(
                        self.name(),
                        format!("segment {sequence} appended while another append was in flight"),
                        Some(index),
                    ));
                }
                TraceEvent::Appended(_) => in_flight = true,
                TraceEvent::Completed if !in_flight => {
                    return Err(InvariantViolation::new(
                        self.name(),
                        "completion with no append in flight".to_string(),
                        Some(index),
                    ));
                }
                TraceEvent::Completed => in_flight = false,
                TraceEvent::Arrived(_) | TraceEvent::Ready => {}
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "SingleInFlight"
    }
}

/// No append happens before the first readiness signal.
pub struct ReadinessGateInvariant;

impl Invariant for ReadinessGateInvariant {
    fn check(&self, trace: &SessionTrace) -> Result<(), InvariantViolation> {
        for (index, event) in trace.events().iter().enumerate() {
            match event {
                TraceEvent::Ready => return Ok(()),
                TraceEvent::Appended(sequence) => {
                    return Err(InvariantViolation::new(
                        self.name(),
                        format!("segment {sequence} appended before the sink was ready"),
                        Some(index),
                    ));
                }
                TraceEvent::Arrived(_) | TraceEvent::Completed => {}
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ReadinessGate"
    }
}

/// Every arrived segment was appended exactly once.
///
/// Only meaningful for a trace that ran to completion: sink ready and
/// every append completed.
pub struct NoLossInvariant;

impl Invariant for NoLossInvariant {
    fn check(&self, trace: &SessionTrace) -> Result<(), InvariantViolation> {
        let arrived = trace.arrived();
        let appended = trace.appended();

        let mut seen = HashSet::new();
        for sequence in &appended {
            if !seen.insert(*sequence) {
                return Err(InvariantViolation::new(
                    self.name(),
                    format!("segment {sequence} appended more than once"),
                    None,
                ));
            }
        }

        if let Some(missing) = arrived.iter().find(|sequence| !seen.contains(sequence)) {
            return Err(InvariantViolation::new(
                self.name(),
                format!(
                    "segment {missing} never appended ({} of {} delivered)",
                    appended.len(),
                    arrived.len()
                ),
                None,
            ));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "NoLoss"
    }
}

/// The full set of pump invariants.
pub fn standard_invariants() -> Vec<Box<dyn Invariant>> {
    vec![
        Box::new(OrderingInvariant),
        Box::new(SingleInFlightInvariant),
        Box::new(ReadinessGateInvariant),
        Box::new(NoLossInvariant),
    ]
}

/// Runs every invariant, collecting all violations.
pub fn check_all(invariants: &[Box<dyn Invariant>], trace: &SessionTrace) -> Vec<InvariantViolation> {
    invariants
        .iter()
        .filter_map(|invariant| invariant.check(trace).err())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceEvent::{Appended, Arrived, Completed, Ready};

    fn build_trace(events: &[TraceEvent]) -> SessionTrace {
        let mut trace = SessionTrace::new();
        for event in events {
            trace.record(*event);
        }
        trace
    }

    #[test]
    fn test_valid_trace_passes_everything() {
        let trace = build_trace(&[
            Arrived(0),
            Arrived(1),
            Ready,
            Appended(0),
            Arrived(2),
            Completed,
            Appended(1),
            Completed,
            Appended(2),
            Completed,
        ]);
        assert!(check_all(&standard_invariants(), &trace).is_empty());
    }

    #[test]
    fn test_ordering_detects_swap() {
        let trace = build_trace(&[Arrived(0), Arrived(1), Ready, Appended(1)]);
        let violation = OrderingInvariant.check(&trace).unwrap_err();
        assert_eq!(violation.invariant, "Ordering");
        assert_eq!(violation.event_index, Some(3));
    }

    #[test]
    fn test_single_in_flight_detects_overlap() {
        let trace = build_trace(&[Arrived(0), Arrived(1), Ready, Appended(0), Appended(1)]);
        assert!(SingleInFlightInvariant.check(&trace).is_err());

        let trace = build_trace(&[Ready, Completed]);
        assert!(SingleInFlightInvariant.check(&trace).is_err());
    }

    #[test]
    fn test_readiness_gate_detects_early_append() {
        let trace = build_trace(&[Arrived(0), Appended(0), Ready]);
        let violation = ReadinessGateInvariant.check(&trace).unwrap_err();
        assert!(violation.to_string().contains("before the sink was ready"));
    }

    #[test]
    fn test_no_loss_detects_missing_and_duplicate() {
        let trace = build_trace(&[Arrived(0), Arrived(1), Ready, Appended(0), Completed]);
        let violation = NoLossInvariant.check(&trace).unwrap_err();
        assert!(violation.description.contains("segment 1 never appended"));

        let trace = build_trace(&[
            Arrived(0),
            Ready,
            Appended(0),
            Completed,
            Appended(0),
            Completed,
        ]);
        assert!(NoLossInvariant.check(&trace).is_err());
    }
}
