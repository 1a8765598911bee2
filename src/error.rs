//! Error types for the chat hub
//!
//! One enum per layer: message validation, hub operations, the transport
//! stream, and top-level connection handling.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Rejection of an inbound chat message
///
/// Recovered locally: the `Display` text is sent back to the originating
/// session only and the session stays active.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Body is empty or whitespace only
    #[error("message cannot be empty")]
    EmptyMessage,

    /// No sender identity
    #[error("username cannot be empty")]
    EmptySender,

    /// Body longer than the allowed number of characters
    #[error("message exceeds maximum length of 500 characters")]
    MessageTooLong,

    /// Kind is not one a client may send
    #[error("invalid message type")]
    InvalidKind,

    /// Message claims to come from another user
    #[error("invalid username: you are not registered as {0}")]
    IdentityMismatch(String),

    /// Private message without a recipient
    #[error("recipient cannot be empty for private messages")]
    EmptyRecipient,

    /// Private message to a username that is not registered
    #[error("recipient does not exist or is not online")]
    RecipientNotFound,
}

/// Transport-level stream errors
///
/// Fatal to the one session owning the stream.
#[derive(Debug, Error)]
pub enum TransportError {
    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization error on the write path
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Peer did not take a write within the write timeout
    #[error("write timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Stream already closed
    #[error("stream closed")]
    Closed,
}

/// Hub operation errors
#[derive(Debug, Error)]
pub enum HubError {
    /// Registry already holds `max_clients` sessions
    #[error("server is full, please try again later")]
    CapacityExceeded,

    /// The broadcast dispatcher has stopped
    #[error("broadcast queue closed")]
    QueueClosed,

    /// Inbound message rejected
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Read or write failure on a stream
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Application-level errors
///
/// Covers connection setup and the server binary.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket handshake error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Hub refused or lost the session
    #[error("Hub error: {0}")]
    Hub(#[from] HubError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_mismatch_names_claimed_user() {
        let err = ValidationError::IdentityMismatch("Fig9".to_string());
        assert_eq!(err.to_string(), "invalid username: you are not registered as Fig9");
    }

    #[test]
    fn test_hub_error_is_transparent_for_validation() {
        let err = HubError::from(ValidationError::RecipientNotFound);
        assert_eq!(err.to_string(), "recipient does not exist or is not online");
    }
}
