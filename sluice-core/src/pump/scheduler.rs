//! Append scheduler state machine.

use tracing::{debug, info, trace, warn};

use super::{PumpError, PumpEvent, PumpStats, SchedulerState, SegmentQueue};
use crate::config::SessionConfig;
use crate::sink::MediaSink;

/// Serializes segment appends into a single-slot media sink.
///
/// Owns the segment queue and the sink for one session. Every event is
/// handled to completion before the next one; any append the event
/// unblocks is issued synchronously inside [`handle_event`].
///
/// [`handle_event`]: AppendScheduler::handle_event
pub struct AppendScheduler<S> {
    sink: S,
    queue: SegmentQueue,
    state: SchedulerState,
    /// Latched on the first readiness signal, never reset.
    sink_ready: bool,
    stats: PumpStats,
    queue_warn_depth: usize,
    depth_warning_armed: bool,
}

impl<S: MediaSink> AppendScheduler<S> {
    /// Creates a scheduler with default session settings.
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, &SessionConfig::default())
    }

    /// Creates a scheduler for `sink` using the given session settings.
    pub fn with_config(sink: S, config: &SessionConfig) -> Self {
        Self {
            sink,
            queue: SegmentQueue::new(),
            state: SchedulerState::Idle,
            sink_ready: false,
            stats: PumpStats::default(),
            queue_warn_depth: config.queue_warn_depth.max(1),
            depth_warning_armed: true,
        }
    }

    /// Applies one event to the state machine.
    ///
    /// # Errors
    ///
    /// - `PumpError::UnexpectedCompletion` - Completion reported while idle
    /// - `PumpError::Sink` - Sink refused to start an append
    /// - `PumpError::EmptyQueue` - Queue contract broken (never in correct operation)
    pub fn handle_event(&mut self, event: PumpEvent) -> Result<(), PumpError> {
        trace!(event = event.as_str(), state = ?self.state, queued = self.queue.len(), "Handling pump event");

        match event {
            PumpEvent::SinkBecameReady => {
                if self.sink_ready {
                    trace!("Duplicate sink readiness ignored");
                } else {
                    self.sink_ready = true;
                    info!(queued = self.queue.len(), "Sink ready");
                }
                if self.state == SchedulerState::Idle {
                    self.append_next()?;
                }
            }

            PumpEvent::SegmentArrived(segment) => {
                self.stats.segments_received += 1;
                self.stats.bytes_received += segment.len() as u64;
                self.queue.enqueue(segment);
                self.observe_queue_depth();

                if self.sink_ready && self.state == SchedulerState::Idle {
                    self.append_next()?;
                }
            }

            PumpEvent::AppendCompleted => match self.state {
                SchedulerState::Idle => {
                    warn!("Sink completed an append that was never issued");
                    return Err(PumpError::UnexpectedCompletion);
                }
                SchedulerState::AppendInFlight => {
                    self.stats.completions += 1;
                    self.state = SchedulerState::Idle;
                    self.append_next()?;
                }
            },
        }

        Ok(())
    }

    /// Moves the queue head into the sink if there is one.
    ///
    /// Callers guarantee the sink is ready and the slot is free.
    fn append_next(&mut self) -> Result<(), PumpError> {
        debug_assert!(self.sink_ready);
        debug_assert_eq!(self.state, SchedulerState::Idle);

        if self.queue.is_empty() {
            return Ok(());
        }

        let segment = self.queue.dequeue()?;
        let bytes = segment.len() as u64;
        self.sink.append(segment)?;

        self.state = SchedulerState::AppendInFlight;
        self.stats.segments_appended += 1;
        self.stats.bytes_appended += bytes;
        debug!(
            sequence = self.stats.segments_appended,
            bytes,
            remaining = self.queue.len(),
            "Appended segment"
        );

        if !self.depth_warning_armed && self.queue.len() * 2 < self.queue_warn_depth {
            self.depth_warning_armed = true;
        }

        Ok(())
    }

    fn observe_queue_depth(&mut self) {
        let depth = self.queue.len();
        self.stats.peak_queue_depth = self.stats.peak_queue_depth.max(depth);

        if self.depth_warning_armed && depth >= self.queue_warn_depth {
            self.depth_warning_armed = false;
            warn!(
                depth,
                queued_bytes = self.queue.queued_bytes(),
                sink_ready = self.sink_ready,
                "Segment queue is backing up"
            );
        }
    }

    /// Current append slot state.
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Whether the sink has reported ready.
    pub fn is_sink_ready(&self) -> bool {
        self.sink_ready
    }

    /// Segments waiting for the sink.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Snapshot of the session counters.
    pub fn stats(&self) -> PumpStats {
        PumpStats {
            queue_depth: self.queue.len(),
            queued_bytes: self.queue.queued_bytes(),
            sink_ready: self.sink_ready,
            state: self.state,
            ..self.stats.clone()
        }
    }

    /// Borrows the sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consumes the scheduler, returning the sink. Queued segments are dropped.
    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Segment;
    use crate::sink::SinkError;

    /// Sink that records appends and enforces the single-slot contract.
    #[derive(Default)]
    struct StrictSink {
        appended: Vec<Segment>,
        busy: bool,
        fail_next: Option<SinkError>,
    }

    impl StrictSink {
        fn complete(&mut self) {
            assert!(self.busy, "completion without outstanding append");
            self.busy = false;
        }
    }

    impl MediaSink for StrictSink {
        fn append(&mut self, segment: Segment) -> Result<(), SinkError> {
            if let Some(error) = self.fail_next.take() {
                return Err(error);
            }
            if self.busy {
                return Err(SinkError::InvalidState);
            }
            self.busy = true;
            self.appended.push(segment);
            Ok(())
        }
    }

    fn segment(tag: u8) -> Segment {
        Segment::from(vec![tag])
    }

    fn complete(scheduler: &mut AppendScheduler<StrictSink>) -> Result<(), PumpError> {
        scheduler.sink.complete();
        scheduler.handle_event(PumpEvent::AppendCompleted)
    }

    fn appended_tags(scheduler: &AppendScheduler<StrictSink>) -> Vec<u8> {
        scheduler
            .sink()
            .appended
            .iter()
            .map(|s| s.as_bytes()[0])
            .collect()
    }

    #[test]
    fn test_ready_then_arrival_appends_immediately() {
        let mut scheduler = AppendScheduler::new(StrictSink::default());

        scheduler.handle_event(PumpEvent::SinkBecameReady).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        scheduler
            .handle_event(PumpEvent::SegmentArrived(segment(b'A')))
            .unwrap();

        assert_eq!(appended_tags(&scheduler), vec![b'A']);
        assert_eq!(scheduler.state(), SchedulerState::AppendInFlight);
        assert_eq!(scheduler.queue_len(), 0);
    }

    #[test]
    fn test_segments_before_ready_are_held() {
        let mut scheduler = AppendScheduler::new(StrictSink::default());

        scheduler
            .handle_event(PumpEvent::SegmentArrived(segment(b'A')))
            .unwrap();
        scheduler
            .handle_event(PumpEvent::SegmentArrived(segment(b'B')))
            .unwrap();
        assert!(appended_tags(&scheduler).is_empty());
        assert_eq!(scheduler.queue_len(), 2);

        scheduler.handle_event(PumpEvent::SinkBecameReady).unwrap();
        assert_eq!(appended_tags(&scheduler), vec![b'A']);
        assert_eq!(scheduler.state(), SchedulerState::AppendInFlight);

        complete(&mut scheduler).unwrap();
        assert_eq!(appended_tags(&scheduler), vec![b'A', b'B']);
        assert_eq!(scheduler.state(), SchedulerState::AppendInFlight);
        assert_eq!(scheduler.queue_len(), 0);

        complete(&mut scheduler).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_completion_while_idle_is_fatal() {
        let mut scheduler = AppendScheduler::new(StrictSink::default());
        let result = scheduler.handle_event(PumpEvent::AppendCompleted);
        assert_eq!(result, Err(PumpError::UnexpectedCompletion));

        scheduler.handle_event(PumpEvent::SinkBecameReady).unwrap();
        let result = scheduler.handle_event(PumpEvent::AppendCompleted);
        assert_eq!(result, Err(PumpError::UnexpectedCompletion));
    }

    #[test]
    fn test_arrivals_during_flight_wait_for_completion() {
        let mut scheduler = AppendScheduler::new(StrictSink::default());
        scheduler.handle_event(PumpEvent::SinkBecameReady).unwrap();

        for tag in [b'A', b'B', b'C'] {
            scheduler
                .handle_event(PumpEvent::SegmentArrived(segment(tag)))
                .unwrap();
        }
        assert_eq!(appended_tags(&scheduler), vec![b'A']);
        assert_eq!(scheduler.queue_len(), 2);

        complete(&mut scheduler).unwrap();
        complete(&mut scheduler).unwrap();
        assert_eq!(appended_tags(&scheduler), vec![b'A', b'B', b'C']);

        complete(&mut scheduler).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_repeated_readiness_is_idempotent() {
        let mut scheduler = AppendScheduler::new(StrictSink::default());
        scheduler
            .handle_event(PumpEvent::SegmentArrived(segment(b'A')))
            .unwrap();
        scheduler
            .handle_event(PumpEvent::SegmentArrived(segment(b'B')))
            .unwrap();

        scheduler.handle_event(PumpEvent::SinkBecameReady).unwrap();
        scheduler.handle_event(PumpEvent::SinkBecameReady).unwrap();
        scheduler.handle_event(PumpEvent::SinkBecameReady).unwrap();

        // The strict sink would have rejected a second concurrent append.
        assert_eq!(appended_tags(&scheduler), vec![b'A']);
        assert!(scheduler.is_sink_ready());
    }

    #[test]
    fn test_sink_rejection_surfaces() {
        let sink = StrictSink {
            fail_next: Some(SinkError::QuotaExceeded { bytes: 1 }),
            ..Default::default()
        };
        let mut scheduler = AppendScheduler::new(sink);
        scheduler.handle_event(PumpEvent::SinkBecameReady).unwrap();

        let result = scheduler.handle_event(PumpEvent::SegmentArrived(segment(b'A')));
        assert_eq!(
            result,
            Err(PumpError::Sink(SinkError::QuotaExceeded { bytes: 1 }))
        );
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_stats_track_flow() {
        let config = SessionConfig {
            queue_warn_depth: 2,
        };
        let mut scheduler = AppendScheduler::with_config(StrictSink::default(), &config);

        for tag in 0..4u8 {
            scheduler
                .handle_event(PumpEvent::SegmentArrived(Segment::from(vec![tag; 10])))
                .unwrap();
        }
        scheduler.handle_event(PumpEvent::SinkBecameReady).unwrap();
        complete(&mut scheduler).unwrap();

        let stats = scheduler.stats();
        assert_eq!(stats.segments_received, 4);
        assert_eq!(stats.bytes_received, 40);
        assert_eq!(stats.segments_appended, 2);
        assert_eq!(stats.bytes_appended, 20);
        assert_eq!(stats.completions, 1);
        assert_eq!(stats.queue_depth, 2);
        assert_eq!(stats.queued_bytes, 20);
        assert_eq!(stats.peak_queue_depth, 4);
        assert!(stats.sink_ready);
        assert_eq!(stats.state, SchedulerState::AppendInFlight);
        assert_eq!(stats.pending_segments(), 3);
    }

    #[test]
    fn test_depth_warning_rearms_below_half() {
        let config = SessionConfig {
            queue_warn_depth: 4,
        };
        let mut scheduler = AppendScheduler::with_config(StrictSink::default(), &config);

        for tag in 0..3u8 {
            scheduler
                .handle_event(PumpEvent::SegmentArrived(segment(tag)))
                .unwrap();
        }
        assert!(scheduler.depth_warning_armed);

        scheduler
            .handle_event(PumpEvent::SegmentArrived(segment(3)))
            .unwrap();
        assert!(!scheduler.depth_warning_armed);

        scheduler.handle_event(PumpEvent::SinkBecameReady).unwrap();
        complete(&mut scheduler).unwrap();
        // Two still queued, not yet below half
        assert!(!scheduler.depth_warning_armed);

        complete(&mut scheduler).unwrap();
        assert_eq!(scheduler.queue_len(), 1);
        assert!(scheduler.depth_warning_armed);
    }

    #[test]
    fn test_depth_warning_rearms_at_minimum_depth() {
        let config = SessionConfig {
            queue_warn_depth: 1,
        };
        let mut scheduler = AppendScheduler::with_config(StrictSink::default(), &config);

        scheduler
            .handle_event(PumpEvent::SegmentArrived(segment(b'A')))
            .unwrap();
        assert!(!scheduler.depth_warning_armed);

        scheduler.handle_event(PumpEvent::SinkBecameReady).unwrap();
        assert_eq!(scheduler.queue_len(), 0);
        assert!(scheduler.depth_warning_armed);

        // Warns again on the next backlog
        scheduler
            .handle_event(PumpEvent::SegmentArrived(segment(b'B')))
            .unwrap();
        assert!(!scheduler.depth_warning_armed);
    }
}
