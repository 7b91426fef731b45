//! Error types for the command-line client

use thiserror::Error;
use uiharness_protocol::{ErrorReason, ProtocolError};

/// Errors returned by [`crate::client::HarnessClient`]
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport or framing failure
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The server answered with `"status":"error"`
    #[error("{cmd} rejected by server: {reason}")]
    Rejected { cmd: String, reason: ErrorReason },

    /// A value cannot be sent over the flat wire format
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No response line within the client timeout
    #[error("No response from server within {0} ms")]
    Timeout(u64),

    /// An earlier reply never arrived, so later replies cannot be matched
    #[error("Connection out of sync after an unanswered request; reconnect")]
    OutOfSync,
}

impl ClientError {
    pub fn rejected(cmd: impl Into<String>, reason: ErrorReason) -> Self {
        Self::Rejected {
            cmd: cmd.into(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_message() {
        let err = ClientError::rejected("click", ErrorReason::WidgetNotFound);
        assert_eq!(err.to_string(), "click rejected by server: widget_not_found");
        assert!(matches!(
            err,
            ClientError::Rejected {
                reason: ErrorReason::WidgetNotFound,
                ..
            }
        ));
    }

    #[test]
    fn test_protocol_error_is_transparent() {
        let err: ClientError = ProtocolError::ConnectionClosed.into();
        assert_eq!(err.to_string(), "Connection closed");
    }
}
