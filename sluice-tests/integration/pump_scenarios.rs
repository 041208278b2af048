//! Scheduler scenarios exercised through the public API.

use std::sync::Arc;

use parking_lot::Mutex;
use sluice_core::{
    AppendScheduler, MediaSink, PumpError, PumpEvent, SchedulerState, Segment, SinkError,
    SluiceError,
};

/// Sink recording every payload it is handed, shared with the test.
#[derive(Clone, Default)]
struct LoggingSink {
    appended: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl LoggingSink {
    fn appended(&self) -> Vec<Vec<u8>> {
        self.appended.lock().clone()
    }
}

impl MediaSink for LoggingSink {
    fn append(&mut self, segment: Segment) -> Result<(), SinkError> {
        self.appended.lock().push(segment.as_bytes().to_vec());
        Ok(())
    }
}

fn arrived(payload: &[u8]) -> PumpEvent {
    PumpEvent::SegmentArrived(Segment::from(payload.to_vec()))
}

#[test]
fn test_ready_first_then_single_arrival() {
    let sink = LoggingSink::default();
    let mut scheduler = AppendScheduler::new(sink.clone());

    scheduler.handle_event(PumpEvent::SinkBecameReady).unwrap();
    assert!(sink.appended().is_empty());

    scheduler.handle_event(arrived(b"A")).unwrap();

    assert_eq!(sink.appended(), vec![b"A".to_vec()]);
    assert_eq!(scheduler.state(), SchedulerState::AppendInFlight);
}

#[test]
fn test_two_arrivals_before_ready() {
    let sink = LoggingSink::default();
    let mut scheduler = AppendScheduler::new(sink.clone());

    scheduler.handle_event(arrived(b"A")).unwrap();
    scheduler.handle_event(arrived(b"B")).unwrap();
    assert!(sink.appended().is_empty());

    scheduler.handle_event(PumpEvent::SinkBecameReady).unwrap();
    assert_eq!(sink.appended(), vec![b"A".to_vec()]);

    scheduler.handle_event(PumpEvent::AppendCompleted).unwrap();
    assert_eq!(sink.appended(), vec![b"A".to_vec(), b"B".to_vec()]);
    assert_eq!(scheduler.queue_len(), 0);
}

#[test]
fn test_completion_while_idle_raises_unexpected_completion() {
    let mut scheduler = AppendScheduler::new(LoggingSink::default());
    scheduler.handle_event(PumpEvent::SinkBecameReady).unwrap();

    let error = scheduler
        .handle_event(PumpEvent::AppendCompleted)
        .unwrap_err();
    assert_eq!(error, PumpError::UnexpectedCompletion);

    let error = SluiceError::from(error);
    assert!(error.is_protocol_violation());
}

#[test]
fn test_no_appends_before_readiness_regardless_of_backlog() {
    let sink = LoggingSink::default();
    let mut scheduler = AppendScheduler::new(sink.clone());

    for index in 0..500u16 {
        scheduler
            .handle_event(arrived(&index.to_be_bytes()))
            .unwrap();
    }

    assert!(sink.appended().is_empty());
    assert_eq!(scheduler.queue_len(), 500);
    assert_eq!(scheduler.stats().peak_queue_depth, 500);

    scheduler.handle_event(PumpEvent::SinkBecameReady).unwrap();
    assert_eq!(sink.appended().len(), 1);
}

#[test]
fn test_drain_returns_to_idle_then_resumes() {
    let sink = LoggingSink::default();
    let mut scheduler = AppendScheduler::new(sink.clone());

    scheduler.handle_event(PumpEvent::SinkBecameReady).unwrap();
    scheduler.handle_event(arrived(b"A")).unwrap();
    scheduler.handle_event(PumpEvent::AppendCompleted).unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Idle);

    // A fresh arrival on an idle, ready pump goes straight out
    scheduler.handle_event(arrived(b"B")).unwrap();
    assert_eq!(scheduler.state(), SchedulerState::AppendInFlight);
    assert_eq!(sink.appended(), vec![b"A".to_vec(), b"B".to_vec()]);

    let stats = scheduler.stats();
    assert_eq!(stats.segments_appended, 2);
    assert_eq!(stats.completions, 1);
}

#[test]
fn test_sink_quota_error_propagates() {
    struct FullSink;

    impl MediaSink for FullSink {
        fn append(&mut self, segment: Segment) -> Result<(), SinkError> {
            Err(SinkError::QuotaExceeded {
                bytes: segment.len() as u64,
            })
        }
    }

    let mut scheduler = AppendScheduler::new(FullSink);
    scheduler.handle_event(arrived(b"four")).unwrap();

    let error = scheduler
        .handle_event(PumpEvent::SinkBecameReady)
        .unwrap_err();
    assert_eq!(error, PumpError::Sink(SinkError::QuotaExceeded { bytes: 4 }));
    assert!(SluiceError::from(error).user_message().contains("4 bytes"));
}
