//! Handle for communicating with the session actor.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::SessionError;
use super::commands::{SessionCommand, SessionId};
use crate::pump::{PumpError, PumpStats};
use crate::segment::Segment;
use crate::sink::{SinkReadyState, SinkSignal};

/// Handle for feeding events to, and querying, a session actor.
///
/// Cheap to clone. Source and sink collaborators each hold a clone; event
/// delivery never blocks, so it can be called from synchronous callbacks.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    sender: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    /// Creates a new handle with the given command sender.
    pub fn new(id: SessionId, sender: mpsc::UnboundedSender<SessionCommand>) -> Self {
        Self { id, sender }
    }

    /// Identifier of the session this handle talks to.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Delivers one segment from the source.
    ///
    /// # Errors
    /// - `SessionError::SessionClosed` - Session actor has stopped
    pub fn segment_arrived(&self, segment: impl Into<Segment>) -> Result<(), SessionError> {
        self.send(SessionCommand::SegmentArrived {
            segment: segment.into(),
        })
    }

    /// Forwards a raw sink signal in the order the sink raised it.
    ///
    /// # Errors
    /// - `SessionError::SessionClosed` - Session actor has stopped
    pub fn sink_signal(&self, signal: SinkSignal) -> Result<(), SessionError> {
        self.send(SessionCommand::Sink { signal })
    }

    /// Reports a sink lifecycle change.
    ///
    /// # Errors
    /// - `SessionError::SessionClosed` - Session actor has stopped
    pub fn sink_ready_state(&self, state: SinkReadyState) -> Result<(), SessionError> {
        self.sink_signal(SinkSignal::ReadyStateChanged(state))
    }

    /// Reports that the sink opened and accepts appends.
    ///
    /// # Errors
    /// - `SessionError::SessionClosed` - Session actor has stopped
    pub fn sink_ready(&self) -> Result<(), SessionError> {
        self.sink_ready_state(SinkReadyState::Open)
    }

    /// Reports that the outstanding append finished.
    ///
    /// # Errors
    /// - `SessionError::SessionClosed` - Session actor has stopped
    pub fn append_completed(&self) -> Result<(), SessionError> {
        self.sink_signal(SinkSignal::UpdateEnd)
    }

    /// Gets a snapshot of the pump counters.
    ///
    /// # Errors
    /// - `SessionError::SessionClosed` - Session actor has stopped
    pub async fn stats(&self) -> Result<PumpStats, SessionError> {
        let (responder, rx) = oneshot::channel();
        self.send(SessionCommand::GetStats { responder })?;
        rx.await.map_err(|_| SessionError::SessionClosed)
    }

    /// Waits until the queue is empty and no append is in flight.
    ///
    /// Never resolves while the sink stays unready and segments are queued.
    ///
    /// # Errors
    /// - `SessionError::SessionClosed` - Session stopped before draining
    pub async fn wait_drained(&self) -> Result<PumpStats, SessionError> {
        let (responder, rx) = oneshot::channel();
        self.send(SessionCommand::WaitDrained { responder })?;
        rx.await.map_err(|_| SessionError::SessionClosed)
    }

    /// Shuts down the session actor gracefully.
    ///
    /// Queued segments are discarded. After this call all event delivery
    /// returns `SessionError::SessionClosed`.
    ///
    /// # Errors
    /// - `SessionError::SessionClosed` - Session actor had already stopped
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        let (responder, rx) = oneshot::channel();
        self.send(SessionCommand::Shutdown { responder })?;
        rx.await.map_err(|_| SessionError::SessionClosed)
    }

    /// Checks if the session actor is still accepting commands.
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.sender
            .send(command)
            .map_err(|_| SessionError::SessionClosed)
    }
}

/// Join handle for a spawned session.
pub struct SessionTask {
    id: SessionId,
    task: JoinHandle<Result<PumpStats, PumpError>>,
}

impl SessionTask {
    pub(super) fn new(id: SessionId, task: JoinHandle<Result<PumpStats, PumpError>>) -> Self {
        Self { id, task }
    }

    /// Identifier of the session this task runs.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Waits for the session to end and returns its final counters.
    ///
    /// # Errors
    /// - `SessionError::Pump` - Session ended on a fatal pump error
    /// - `SessionError::TaskFailed` - Actor task panicked or was aborted
    pub async fn join(self) -> Result<PumpStats, SessionError> {
        let outcome = self.task.await.map_err(|e| SessionError::TaskFailed {
            reason: e.to_string(),
        })?;
        Ok(outcome?)
    }
}
