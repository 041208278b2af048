//! Session actor wrapping one append scheduler.
//!
//! A session owns the queue, scheduler and sink for one connection to a
//! segment source. Source and sink collaborators talk to it through a
//! cloneable [`SessionHandle`]; everything they report is funnelled into a
//! single channel and handled one event at a time.

mod actor;
mod commands;
mod handle;

pub use actor::spawn_session;
pub use commands::{SessionCommand, SessionId};
pub use handle::{SessionHandle, SessionTask};

use crate::pump::PumpError;

/// Errors surfaced to the owner of a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Session ended on a fatal pump error
    #[error("Session terminated: {0}")]
    Pump(#[from] PumpError),

    /// Session actor is no longer accepting commands
    #[error("Session closed")]
    SessionClosed,

    /// Actor task panicked or was aborted
    #[error("Session task failed: {reason}")]
    TaskFailed { reason: String },
}
