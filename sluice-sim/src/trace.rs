//! Session traces and the recording sink that produces them.

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use sluice_core::{MediaSink, Segment, SinkError};

use crate::rng::DeterministicRng;

/// Bytes at the front of every simulated payload holding its sequence number.
pub const SEQUENCE_HEADER_LEN: usize = 8;

/// One observable step of a session, in the order it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum TraceEvent {
    /// Source delivered segment with this sequence number
    Arrived(u64),
    /// Sink reported ready
    Ready,
    /// Pump handed segment with this sequence number to the sink
    Appended(u64),
    /// Sink reported the outstanding append complete
    Completed,
}

/// Ordered record of everything that happened in one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTrace {
    events: Vec<TraceEvent>,
}

impl SessionTrace {
    /// Creates an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one event.
    pub fn record(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    /// All events in order.
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Sequence numbers in the order the source delivered them.
    pub fn arrived(&self) -> Vec<u64> {
        self.events
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Arrived(sequence) => Some(*sequence),
                _ => None,
            })
            .collect()
    }

    /// Sequence numbers in the order they were appended to the sink.
    pub fn appended(&self) -> Vec<u64> {
        self.events
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Appended(sequence) => Some(*sequence),
                _ => None,
            })
            .collect()
    }

    /// Number of events recorded.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Builds a simulated segment whose payload starts with its sequence number.
///
/// `size` is clamped so the sequence header always fits; the rest of the
/// payload is random filler.
pub fn simulated_segment(sequence: u64, size: usize, rng: &mut DeterministicRng) -> Segment {
    let size = size.max(SEQUENCE_HEADER_LEN);
    let mut filler = vec![0u8; size - SEQUENCE_HEADER_LEN];
    rng.fill_bytes(&mut filler);

    let mut payload = BytesMut::with_capacity(size);
    payload.put_u64(sequence);
    payload.put_slice(&filler);
    Segment::new(payload.freeze())
}

/// Reads the sequence number back out of a simulated segment.
pub fn segment_sequence(segment: &Segment) -> Option<u64> {
    let header: [u8; SEQUENCE_HEADER_LEN] = segment
        .as_bytes()
        .get(..SEQUENCE_HEADER_LEN)?
        .try_into()
        .ok()?;
    Some(u64::from_be_bytes(header))
}

/// Single-slot sink that records appends into a shared trace.
///
/// Mirrors a real media sink: an append issued while another is
/// outstanding is rejected with `SinkError::InvalidState`. The driver
/// releases the slot with [`RecordingSink::complete`].
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    shared: Arc<Mutex<RecordingState>>,
}

#[derive(Debug, Default)]
struct RecordingState {
    trace: SessionTrace,
    busy: bool,
    payloads: Vec<Bytes>,
}

impl RecordingSink {
    /// Creates a sink with an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a non-sink event (arrival or readiness) into the shared trace.
    pub fn record(&self, event: TraceEvent) {
        self.shared.lock().trace.record(event);
    }

    /// Whether an append is outstanding.
    pub fn is_busy(&self) -> bool {
        self.shared.lock().busy
    }

    /// Marks the outstanding append complete.
    ///
    /// Returns false if nothing was outstanding; the completion is still
    /// recorded so invariant checks can see it.
    pub fn complete(&self) -> bool {
        let mut state = self.shared.lock();
        state.trace.record(TraceEvent::Completed);
        std::mem::replace(&mut state.busy, false)
    }

    /// Snapshot of the trace recorded so far.
    pub fn trace(&self) -> SessionTrace {
        self.shared.lock().trace.clone()
    }

    /// Payloads in the order they were appended.
    pub fn payloads(&self) -> Vec<Bytes> {
        self.shared.lock().payloads.clone()
    }
}

impl MediaSink for RecordingSink {
    fn append(&mut self, segment: Segment) -> Result<(), SinkError> {
        let mut state = self.shared.lock();
        if state.busy {
            return Err(SinkError::InvalidState);
        }
        let sequence = segment_sequence(&segment).ok_or(SinkError::InvalidState)?;
        state.busy = true;
        state.trace.record(TraceEvent::Appended(sequence));
        state.payloads.push(segment.into_bytes());
        Ok(())
    }
}
