//! Session actor driven by concurrent source and sink tasks.

use std::time::Duration;

use bytes::Bytes;
use sluice_core::config::{SessionConfig, SluiceConfig};
use sluice_core::sink::ChannelSink;
use sluice_core::{
    PumpError, SchedulerState, SessionError, SinkError, SinkReadyState, spawn_session,
};
use sluice_sim::run_simulated_session;

#[tokio::test]
async fn test_concurrent_source_and_sink_deliver_in_order() {
    let (sink, mut appended) = ChannelSink::new();
    let (handle, task) = spawn_session(&SessionConfig::default(), sink);

    let source = {
        let handle = handle.clone();
        async move {
            for index in 0..50u32 {
                handle.segment_arrived(index.to_be_bytes().to_vec()).unwrap();
                if index % 7 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }
    };

    let consumer = {
        let handle = handle.clone();
        async move {
            handle.sink_ready_state(SinkReadyState::Closed).unwrap();
            tokio::task::yield_now().await;
            handle.sink_ready_state(SinkReadyState::Open).unwrap();

            let mut accepted = Vec::new();
            while accepted.len() < 50 {
                let segment = appended.recv().await.unwrap();
                let bytes: [u8; 4] = segment.as_bytes()[..].try_into().unwrap();
                accepted.push(u32::from_be_bytes(bytes));
                handle.append_completed().unwrap();
            }
            handle.sink_ready_state(SinkReadyState::Ended).unwrap();
            accepted
        }
    };

    let ((), accepted) = futures::join!(source, consumer);
    assert_eq!(accepted, (0..50).collect::<Vec<_>>());

    let drained = handle.wait_drained().await.unwrap();
    assert_eq!(drained.segments_appended, 50);
    assert_eq!(drained.completions, 50);
    assert_eq!(drained.state, SchedulerState::Idle);

    handle.shutdown().await.unwrap();
    let stats = task.join().await.unwrap();
    assert_eq!(stats.segments_received, 50);
    assert_eq!(stats.queue_depth, 0);
}

#[tokio::test]
async fn test_stats_reflect_backlog_before_readiness() {
    let (sink, _appended) = ChannelSink::new();
    let (handle, task) = spawn_session(&SessionConfig::default(), sink);

    for payload in [b"one".to_vec(), b"two".to_vec(), b"three".to_vec()] {
        handle.segment_arrived(payload).unwrap();
    }

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.queue_depth, 3);
    assert_eq!(stats.queued_bytes, 11);
    assert!(!stats.sink_ready);
    assert_eq!(stats.state, SchedulerState::Idle);
    assert_eq!(stats.segments_appended, 0);

    handle.shutdown().await.unwrap();
    let stats = task.join().await.unwrap();
    // Queued segments are discarded on shutdown
    assert_eq!(stats.queue_depth, 3);
}

#[tokio::test]
async fn test_readiness_stays_latched_after_sink_ends() {
    let (sink, mut appended) = ChannelSink::new();
    let (handle, task) = spawn_session(&SessionConfig::default(), sink);

    handle.sink_ready().unwrap();
    handle.segment_arrived(b"A".to_vec()).unwrap();
    assert_eq!(appended.recv().await.unwrap().as_bytes(), b"A");
    handle.append_completed().unwrap();

    handle.sink_ready_state(SinkReadyState::Ended).unwrap();
    handle.segment_arrived(Bytes::from_static(b"B")).unwrap();
    assert_eq!(appended.recv().await.unwrap().as_bytes(), b"B");

    let stats = handle.stats().await.unwrap();
    assert!(stats.sink_ready);
    assert_eq!(stats.state, SchedulerState::AppendInFlight);

    handle.shutdown().await.unwrap();
    task.join().await.unwrap();
}

#[tokio::test]
async fn test_unexpected_completion_terminates_session() {
    let (sink, _appended) = ChannelSink::new();
    let (handle, task) = spawn_session(&SessionConfig::default(), sink);

    handle.sink_ready().unwrap();
    handle.append_completed().unwrap();

    let result = task.join().await;
    assert!(matches!(
        result,
        Err(SessionError::Pump(PumpError::UnexpectedCompletion))
    ));
    assert!(!handle.is_running());
    assert!(matches!(
        handle.segment_arrived(b"late".to_vec()),
        Err(SessionError::SessionClosed)
    ));
}

#[tokio::test]
async fn test_dropped_consumer_surfaces_sink_error() {
    let (sink, appended) = ChannelSink::new();
    drop(appended);
    let (handle, task) = spawn_session(&SessionConfig::default(), sink);

    handle.sink_ready().unwrap();
    handle.segment_arrived(b"lost".to_vec()).unwrap();

    let result = task.join().await;
    assert!(matches!(
        result,
        Err(SessionError::Pump(PumpError::Sink(SinkError::Closed)))
    ));
}

#[tokio::test]
async fn test_simulated_session_report_serializes() {
    let mut config = SluiceConfig::for_testing();
    config.simulation.deterministic_seed = Some(7);
    config.simulation.segment_interval = Duration::from_millis(1);

    let report = run_simulated_session(&config).await.unwrap();
    assert!(report.delivered_in_order());

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["seed"], 7);
    assert_eq!(
        value["stats"]["segments_appended"],
        config.simulation.segment_count as u64
    );
    assert_eq!(value["stats"]["state"], "Idle");
    assert_eq!(
        value["accepted"].as_array().map(Vec::len),
        Some(config.simulation.segment_count)
    );
}
