//! FIFO buffer for segments awaiting the sink.

use std::collections::VecDeque;

use super::QueueError;
use crate::segment::Segment;

/// Ordered, unbounded buffer of segments not yet handed to the sink.
///
/// Insertion order is arrival order is append order. The queue never
/// reorders, duplicates or drops a segment; the scheduler alone decides
/// when the head is consumed.
#[derive(Debug, Default)]
pub struct SegmentQueue {
    segments: VecDeque<Segment>,
    queued_bytes: u64,
}

impl SegmentQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a segment to the tail.
    pub fn enqueue(&mut self, segment: Segment) {
        self.queued_bytes += segment.len() as u64;
        self.segments.push_back(segment);
    }

    /// Removes and returns the head segment.
    ///
    /// # Errors
    ///
    /// - `QueueError::EmptyQueue` - Called with nothing queued
    pub fn dequeue(&mut self) -> Result<Segment, QueueError> {
        let segment = self.segments.pop_front().ok_or(QueueError::EmptyQueue)?;
        self.queued_bytes -= segment.len() as u64;
        Ok(segment)
    }

    /// Number of queued segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Total payload bytes currently queued.
    pub fn queued_bytes(&self) -> u64 {
        self.queued_bytes
    }
}
