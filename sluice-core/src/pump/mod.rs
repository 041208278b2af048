//! Segment buffering and append scheduling.
//!
//! Three independent event sources (segment arrival, sink readiness and
//! append completion) are reconciled into one serialized append sequence.
//! Events are fed one at a time through [`AppendScheduler::handle_event`];
//! the scheduler never holds more than one append outstanding and never
//! appends before the sink reports ready.

pub use self::queue::SegmentQueue;
pub use self::scheduler::AppendScheduler;
use crate::segment::Segment;
use crate::sink::SinkError;

mod queue;
mod scheduler;

/// Error types for segment queue operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// Consumption attempted with nothing queued
    #[error("Segment queue is empty")]
    EmptyQueue,
}

/// Fatal errors raised while handling a pump event.
///
/// None of these are retried; they end the session that owns the pump.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PumpError {
    #[error("Queue error: {0}")]
    EmptyQueue(#[from] QueueError),

    /// Sink reported completion while no append was outstanding
    #[error("Sink reported append completion with no append in flight")]
    UnexpectedCompletion,

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

impl PumpError {
    /// Checks if this error means the sink broke its signalling contract.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, PumpError::UnexpectedCompletion)
    }
}

/// Events the scheduler reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpEvent {
    /// Segment source delivered one segment
    SegmentArrived(Segment),
    /// Sink is ready to accept appends (latched)
    SinkBecameReady,
    /// Outstanding append was fully accepted by the sink
    AppendCompleted,
}

impl PumpEvent {
    /// Returns string representation of event type for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            PumpEvent::SegmentArrived(_) => "SegmentArrived",
            PumpEvent::SinkBecameReady => "SinkBecameReady",
            PumpEvent::AppendCompleted => "AppendCompleted",
        }
    }
}

/// Whether the single append slot is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum SchedulerState {
    #[default]
    Idle,
    AppendInFlight,
}

/// Counters kept by the scheduler over the life of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct PumpStats {
    /// Segments delivered by the source
    pub segments_received: u64,
    /// Payload bytes delivered by the source
    pub bytes_received: u64,
    /// Segments handed to the sink
    pub segments_appended: u64,
    /// Payload bytes handed to the sink
    pub bytes_appended: u64,
    /// Appends the sink reported complete
    pub completions: u64,
    /// Segments currently queued
    pub queue_depth: usize,
    /// Payload bytes currently queued
    pub queued_bytes: u64,
    /// Largest queue depth observed
    pub peak_queue_depth: usize,
    /// Whether the sink has reported ready
    pub sink_ready: bool,
    /// Current append slot state
    pub state: SchedulerState,
}

impl PumpStats {
    /// Segments received but not yet accepted by the sink.
    pub fn pending_segments(&self) -> u64 {
        self.segments_received.saturating_sub(self.completions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_violation_classification() {
        assert!(PumpError::UnexpectedCompletion.is_protocol_violation());
        assert!(!PumpError::from(QueueError::EmptyQueue).is_protocol_violation());
        assert!(!PumpError::from(SinkError::Closed).is_protocol_violation());
    }

    #[test]
    fn test_pending_segments() {
        let stats = PumpStats {
            segments_received: 5,
            segments_appended: 3,
            completions: 2,
            ..Default::default()
        };
        assert_eq!(stats.pending_segments(), 3);

        let inconsistent = PumpStats {
            segments_received: 1,
            completions: 4,
            ..Default::default()
        };
        assert_eq!(inconsistent.pending_segments(), 0);
    }
}
