//! Sluice Core - Ordered segment delivery into single-slot media sinks
//!
//! This crate provides the segment queue and append scheduler that feed
//! asynchronously arriving media segments into a sink that accepts one
//! segment at a time, strictly in order, plus the session actor, sink
//! adapter, configuration and tracing setup around them.

pub mod config;
pub mod pump;
pub mod segment;
pub mod session;
pub mod sink;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::SluiceConfig;
pub use pump::{AppendScheduler, PumpError, PumpEvent, PumpStats, SchedulerState, SegmentQueue};
pub use segment::Segment;
pub use session::{SessionError, SessionHandle, SessionTask, spawn_session};
pub use sink::{MediaSink, SinkError, SinkReadyState, SinkSignal};

/// Core errors that can bubble up from any Sluice subsystem.
#[derive(Debug, thiserror::Error)]
pub enum SluiceError {
    #[error("Pump error: {0}")]
    Pump(#[from] PumpError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SluiceError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            SluiceError::Pump(e) | SluiceError::Session(SessionError::Pump(e)) => match e {
                PumpError::UnexpectedCompletion => {
                    "Media sink reported a completion that was never requested".to_string()
                }
                PumpError::Sink(sink_error) => format!("Media sink rejected a segment: {sink_error}"),
                PumpError::EmptyQueue(_) => "Internal segment queue error".to_string(),
            },
            SluiceError::Session(_) => "Streaming session is no longer running".to_string(),
            SluiceError::Sink(e) => format!("Media sink error: {e}"),
            SluiceError::Configuration { reason } => format!("Invalid configuration: {reason}"),
            SluiceError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error means a sink broke its signalling contract.
    pub fn is_protocol_violation(&self) -> bool {
        match self {
            SluiceError::Pump(e) | SluiceError::Session(SessionError::Pump(e)) => {
                e.is_protocol_violation()
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SluiceError>;
