//! Command definitions for the session actor.

use std::fmt;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::pump::PumpStats;
use crate::segment::Segment;
use crate::sink::SinkSignal;

/// Commands delivered to the session actor.
///
/// Source and sink notifications share one channel with the queries, so
/// the actor sees every event in the order it was raised.
pub enum SessionCommand {
    /// Segment source delivered a segment.
    SegmentArrived { segment: Segment },
    /// Media sink raised a lifecycle or update-end signal.
    Sink { signal: SinkSignal },
    /// Get a snapshot of the pump counters.
    GetStats {
        responder: oneshot::Sender<PumpStats>,
    },
    /// Resolve once every received segment has been accepted by the sink.
    WaitDrained {
        responder: oneshot::Sender<PumpStats>,
    },
    /// Shutdown the session actor gracefully.
    Shutdown { responder: oneshot::Sender<()> },
}

/// Identifier attached to a session's log span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a random session id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
