//! Actor implementation for a segment pump session.

use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use super::commands::{SessionCommand, SessionId};
use super::handle::{SessionHandle, SessionTask};
use crate::config::SessionConfig;
use crate::pump::{AppendScheduler, PumpError, PumpEvent, PumpStats, SchedulerState};
use crate::sink::{MediaSink, SinkSignalAdapter};

/// Spawns a session actor that pumps segments into `sink`.
///
/// The actor owns the queue, the scheduler and the sink, and processes
/// commands one at a time in arrival order, so no state is shared or
/// locked. It runs until shut down, until every handle is dropped, or
/// until a fatal pump error ends it.
///
/// # Examples
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() {
/// use sluice_core::config::SessionConfig;
/// use sluice_core::session::spawn_session;
/// use sluice_core::sink::ChannelSink;
///
/// let (sink, mut appended) = ChannelSink::new();
/// let (handle, task) = spawn_session(&SessionConfig::default(), sink);
///
/// handle.segment_arrived(vec![0u8; 188]).unwrap();
/// handle.sink_ready().unwrap();
/// let segment = appended.recv().await.unwrap();
/// handle.append_completed().unwrap();
///
/// handle.shutdown().await.unwrap();
/// let stats = task.join().await.unwrap();
/// assert_eq!(stats.completions, 1);
/// # }
/// ```
pub fn spawn_session<S>(config: &SessionConfig, sink: S) -> (SessionHandle, SessionTask)
where
    S: MediaSink + Send + 'static,
{
    let id = SessionId::new();
    let (sender, receiver) = mpsc::unbounded_channel();
    let scheduler = AppendScheduler::with_config(sink, config);

    let span = tracing::info_span!("session", id = %id);
    let task = tokio::spawn(run_actor_loop(scheduler, receiver).instrument(span));

    (SessionHandle::new(id, sender), SessionTask::new(id, task))
}

/// Runs the main actor message processing loop.
///
/// Returns the final counters on a clean stop, or the pump error that
/// terminated the session.
async fn run_actor_loop<S: MediaSink>(
    mut scheduler: AppendScheduler<S>,
    mut receiver: mpsc::UnboundedReceiver<SessionCommand>,
) -> Result<PumpStats, PumpError> {
    tracing::debug!("Session actor started");

    let mut adapter = SinkSignalAdapter::new();
    let mut drain_waiters: Vec<oneshot::Sender<PumpStats>> = Vec::new();

    while let Some(command) = receiver.recv().await {
        match handle_command(&mut scheduler, &mut adapter, &mut drain_waiters, command) {
            Ok(true) => {}
            Ok(false) => break,
            Err(error) => {
                tracing::error!(%error, "Session terminated by pump error");
                return Err(error);
            }
        }

        if !drain_waiters.is_empty() && is_drained(&scheduler) {
            let stats = scheduler.stats();
            for waiter in drain_waiters.drain(..) {
                let _ = waiter.send(stats.clone());
            }
        }
    }

    let stats = scheduler.stats();
    tracing::debug!(
        appended = stats.segments_appended,
        discarded = stats.queue_depth,
        "Session actor stopped"
    );
    Ok(stats)
}

/// Handles a single command for the session.
/// Returns true to continue processing, false to shutdown.
fn handle_command<S: MediaSink>(
    scheduler: &mut AppendScheduler<S>,
    adapter: &mut SinkSignalAdapter,
    drain_waiters: &mut Vec<oneshot::Sender<PumpStats>>,
    command: SessionCommand,
) -> Result<bool, PumpError> {
    match command {
        SessionCommand::SegmentArrived { segment } => {
            scheduler.handle_event(PumpEvent::SegmentArrived(segment))?;
        }

        SessionCommand::Sink { signal } => {
            if let Some(event) = adapter.translate(signal) {
                scheduler.handle_event(event)?;
            }
        }

        SessionCommand::GetStats { responder } => {
            let _ = responder.send(scheduler.stats());
        }

        SessionCommand::WaitDrained { responder } => {
            drain_waiters.push(responder);
        }

        SessionCommand::Shutdown { responder } => {
            tracing::debug!("Session actor shutting down");
            let _ = responder.send(());
            return Ok(false);
        }
    }
    Ok(true)
}

fn is_drained<S: MediaSink>(scheduler: &AppendScheduler<S>) -> bool {
    scheduler.queue_len() == 0 && scheduler.state() == SchedulerState::Idle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionError;
    use crate::sink::{ChannelSink, SinkReadyState};
    use tokio_test::{assert_pending, assert_ready};

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let (sink, _appended) = ChannelSink::new();
        let (handle, task) = spawn_session(&SessionConfig::default(), sink);
        assert!(handle.is_running());
        assert_eq!(handle.id(), task.id());

        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.segments_received, 0);
        assert!(!stats.sink_ready);

        handle.shutdown().await.unwrap();
        let stats = task.join().await.unwrap();
        assert_eq!(stats.segments_appended, 0);

        // The channel is closed, so further operations fail
        assert!(!handle.is_running());
        assert!(matches!(
            handle.segment_arrived(vec![1u8]),
            Err(SessionError::SessionClosed)
        ));
        assert!(matches!(
            handle.stats().await,
            Err(SessionError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn test_segments_flow_in_order_through_channel_sink() {
        let (sink, mut appended) = ChannelSink::new();
        let (handle, task) = spawn_session(&SessionConfig::default(), sink);

        handle.segment_arrived(vec![1u8]).unwrap();
        handle.segment_arrived(vec![2u8]).unwrap();
        handle.segment_arrived(vec![3u8]).unwrap();
        handle.sink_ready().unwrap();

        for expected in 1..=3u8 {
            let segment = appended.recv().await.unwrap();
            assert_eq!(segment.as_bytes(), &[expected]);
            handle.append_completed().unwrap();
        }

        let stats = handle.wait_drained().await.unwrap();
        assert_eq!(stats.completions, 3);
        assert_eq!(stats.queue_depth, 0);
        assert_eq!(stats.state, SchedulerState::Idle);

        handle.shutdown().await.unwrap();
        task.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_only_open_state_releases_appends() {
        let (sink, mut appended) = ChannelSink::new();
        let (handle, task) = spawn_session(&SessionConfig::default(), sink);

        handle.segment_arrived(vec![9u8]).unwrap();
        handle.sink_ready_state(SinkReadyState::Closed).unwrap();
        handle.sink_ready_state(SinkReadyState::Ended).unwrap();

        let stats = handle.stats().await.unwrap();
        assert!(!stats.sink_ready);
        assert!(appended.try_recv().is_err());

        handle.sink_ready_state(SinkReadyState::Open).unwrap();
        assert_eq!(appended.recv().await.unwrap().as_bytes(), &[9]);

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
        assert!(matches!(
            handle.append_completed(),
            Err(SessionError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn test_closed_sink_terminates_session() {
        let (sink, appended) = ChannelSink::new();
        drop(appended);
        let (handle, task) = spawn_session(&SessionConfig::default(), sink);

        handle.sink_ready().unwrap();
        handle.segment_arrived(vec![1u8]).unwrap();

        let result = task.join().await;
        assert!(matches!(
            result,
            Err(SessionError::Pump(PumpError::Sink(
                crate::sink::SinkError::Closed
            )))
        ));
    }

    #[tokio::test]
    async fn test_dropping_all_handles_ends_session() {
        let (sink, _appended) = ChannelSink::new();
        let (handle, task) = spawn_session(&SessionConfig::default(), sink);

        handle.segment_arrived(vec![1u8, 2]).unwrap();
        drop(handle);

        let stats = task.join().await.unwrap();
        assert_eq!(stats.segments_received, 1);
        assert_eq!(stats.queue_depth, 1);
    }

    #[tokio::test]
    async fn test_wait_drained_fails_on_shutdown() {
        let (sink, _appended) = ChannelSink::new();
        let (handle, task) = spawn_session(&SessionConfig::default(), sink);

        // Never ready, so the queue cannot drain
        handle.segment_arrived(vec![1u8]).unwrap();

        // First poll registers the waiter ahead of anything sent later
        let mut waiter = tokio_test::task::spawn(handle.wait_drained());
        assert_pending!(waiter.poll());

        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.queue_depth, 1);
        assert_pending!(waiter.poll());

        handle.shutdown().await.unwrap();
        task.join().await.unwrap();

        assert!(waiter.is_woken());
        let result = assert_ready!(waiter.poll());
        assert!(matches!(result, Err(SessionError::SessionClosed)));
    }
}
