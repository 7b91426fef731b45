//! Error types for the automation harness

use thiserror::Error;
use uiharness_protocol::ErrorReason;

/// Stable classification of harness failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidParam,
    Memory,
    Network,
    Screenshot,
    QueueFull,
    InvalidWidget,
    EventFailed,
    Timeout,
    Abandoned,
}

/// Errors produced by the registry, the queue, the dispatcher and the server
#[derive(Debug, Error)]
pub enum HarnessError {
    /// No widget registered under this id
    #[error("Widget '{0}' not found")]
    NotFound(String),

    /// A required value is absent or out of range
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    /// A buffer could not be sized
    #[error("Cannot allocate {0}")]
    Memory(String),

    /// Socket bind, listen or accept failure
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// Frame capture or encoding failure
    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    /// The command queue is at capacity
    #[error("Command queue full ({capacity} pending)")]
    QueueFull { capacity: usize },

    /// The widget resolved but the UI host cannot use it
    #[error("Widget '{0}' is not usable")]
    InvalidWidget(String),

    /// The UI host rejected a simulated event
    #[error("Event simulation failed: {0}")]
    EventFailed(String),

    /// The UI thread did not complete the command in time
    #[error("Timed out after {0} ms waiting for the UI thread")]
    Timeout(u64),

    /// The command was dropped before it ran
    #[error("Command abandoned before completion")]
    Abandoned,
}

impl HarnessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidParam(_) => ErrorKind::InvalidParam,
            Self::Memory(_) => ErrorKind::Memory,
            Self::Network(_) => ErrorKind::Network,
            Self::Screenshot(_) => ErrorKind::Screenshot,
            Self::QueueFull { .. } => ErrorKind::QueueFull,
            Self::InvalidWidget(_) => ErrorKind::InvalidWidget,
            Self::EventFailed(_) => ErrorKind::EventFailed,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Abandoned => ErrorKind::Abandoned,
        }
    }

    /// Wire reason for this error on a command whose own failure reason is `fallback`
    ///
    /// Queue-level failures are reported the same way for every command.
    pub fn reason(&self, fallback: ErrorReason) -> ErrorReason {
        match self.kind() {
            ErrorKind::QueueFull => ErrorReason::QueueFull,
            ErrorKind::Timeout => ErrorReason::Timeout,
            ErrorKind::Abandoned => ErrorReason::Aborted,
            _ => fallback,
        }
    }
}
