//! Boundary between the pump and the media sink.
//!
//! The pump only knows how to start an append. Everything the sink reports
//! back (its lifecycle and the end of each append) arrives as raw
//! [`SinkSignal`]s which [`SinkSignalAdapter`] turns into pump events,
//! preserving the order the sink raised them.

use tokio::sync::mpsc;

use crate::pump::PumpEvent;
use crate::segment::Segment;

/// Errors raised by a media sink when an append cannot be started.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// Sink is not in a state that accepts data (closed, ended, or busy)
    #[error("Sink rejected append: invalid state")]
    InvalidState,

    /// Sink has no room for the segment
    #[error("Sink quota exceeded appending {bytes} bytes")]
    QuotaExceeded { bytes: u64 },

    /// Consumer side of the sink has gone away
    #[error("Sink closed")]
    Closed,
}

/// Single-slot asynchronous append target.
///
/// `append` only starts the operation; the sink reports acceptance later
/// through [`SinkSignal::UpdateEnd`]. Implementations may reject an append
/// issued while another is outstanding; the pump never does that.
pub trait MediaSink {
    /// Hands one segment to the sink.
    ///
    /// # Errors
    ///
    /// - `SinkError` - The sink refused to start the append
    fn append(&mut self, segment: Segment) -> Result<(), SinkError>;
}

impl<S: MediaSink + ?Sized> MediaSink for Box<S> {
    fn append(&mut self, segment: Segment) -> Result<(), SinkError> {
        (**self).append(segment)
    }
}

/// Lifecycle of the media sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum SinkReadyState {
    #[default]
    Closed,
    Open,
    Ended,
}

/// Raw notification raised by a media sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkSignal {
    /// Sink moved to a new lifecycle state
    ReadyStateChanged(SinkReadyState),
    /// Previously started append finished
    UpdateEnd,
}

/// Translates sink signals into pump events.
///
/// Entering `Open` yields [`PumpEvent::SinkBecameReady`]; every
/// `UpdateEnd` yields exactly one [`PumpEvent::AppendCompleted`]. Other
/// lifecycle changes are tracked but produce no event.
#[derive(Debug, Default)]
pub struct SinkSignalAdapter {
    ready_state: SinkReadyState,
}

impl SinkSignalAdapter {
    /// Creates an adapter for a sink that starts `Closed`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last lifecycle state reported by the sink.
    pub fn ready_state(&self) -> SinkReadyState {
        self.ready_state
    }

    /// Converts one sink signal into the pump event it implies, if any.
    pub fn translate(&mut self, signal: SinkSignal) -> Option<PumpEvent> {
        match signal {
            SinkSignal::ReadyStateChanged(state) => {
                let previous = std::mem::replace(&mut self.ready_state, state);
                if previous != state {
                    tracing::debug!(?previous, current = ?state, "Sink ready state changed");
                }
                (state == SinkReadyState::Open).then_some(PumpEvent::SinkBecameReady)
            }
            SinkSignal::UpdateEnd => Some(PumpEvent::AppendCompleted),
        }
    }
}

/// Media sink that forwards each appended segment to an asynchronous
/// consumer task over an unbounded channel.
///
/// The consumer performs the real append and reports completion back to
/// the session with [`SinkSignal::UpdateEnd`].
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Segment>,
}

impl ChannelSink {
    /// Creates the sink and the receiver its consumer task reads from.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Segment>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl MediaSink for ChannelSink {
    fn append(&mut self, segment: Segment) -> Result<(), SinkError> {
        self.sender.send(segment).map_err(|_| SinkError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_yields_ready() {
        let mut adapter = SinkSignalAdapter::new();
        assert_eq!(adapter.ready_state(), SinkReadyState::Closed);

        let event = adapter.translate(SinkSignal::ReadyStateChanged(SinkReadyState::Open));
        assert_eq!(event, Some(PumpEvent::SinkBecameReady));
        assert_eq!(adapter.ready_state(), SinkReadyState::Open);
    }

    #[test]
    fn test_non_open_states_yield_nothing() {
        let mut adapter = SinkSignalAdapter::new();
        assert_eq!(
            adapter.translate(SinkSignal::ReadyStateChanged(SinkReadyState::Closed)),
            None
        );
        assert_eq!(
            adapter.translate(SinkSignal::ReadyStateChanged(SinkReadyState::Ended)),
            None
        );
        assert_eq!(adapter.ready_state(), SinkReadyState::Ended);
    }

    #[test]
    fn test_every_update_end_is_forwarded() {
        let mut adapter = SinkSignalAdapter::new();
        for _ in 0..3 {
            assert_eq!(
                adapter.translate(SinkSignal::UpdateEnd),
                Some(PumpEvent::AppendCompleted)
            );
        }
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_and_detects_close() {
        let (mut sink, mut receiver) = ChannelSink::new();
        sink.append(Segment::from(vec![1, 2])).unwrap();
        assert_eq!(receiver.recv().await.unwrap().as_bytes(), &[1, 2]);

        drop(receiver);
        assert_eq!(
            sink.append(Segment::from(vec![3])),
            Err(SinkError::Closed)
        );
    }
}
