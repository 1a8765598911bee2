//! Message protocol definitions
//!
//! JSON wire shapes exchanged with chat clients. Field names are fixed for
//! compatibility with existing clients:
//!
//! ```text
//! { "type": "chat" | "private" | "system",
//!   "username": string,
//!   "message": string,
//!   "to": string }            // private messages only
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{HubError, ValidationError};
use crate::types::Username;

/// Sender name carried by departure notices
pub const SYSTEM_SENDER: &str = "System";

/// Kind of a chat message
///
/// `System` is produced by the server only. Any `type` string the server does
/// not know deserializes to `Unknown` so it can be rejected by validation
/// instead of failing to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Broadcast to everyone but the sender
    #[serde(rename = "chat")]
    Public,
    /// Delivered to exactly one recipient
    Private,
    /// Server-generated notice
    System,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A unit of chat communication, in both directions
///
/// Missing fields deserialize to their empty value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Asserted originator
    #[serde(rename = "username")]
    pub sender: String,
    #[serde(rename = "message")]
    pub body: String,
    #[serde(rename = "to", skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
}

impl ChatMessage {
    /// Create a public message
    pub fn public(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Public,
            sender: sender.into(),
            body: body.into(),
            recipient: None,
        }
    }

    /// Create a private message
    pub fn private(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            kind: MessageKind::Private,
            sender: sender.into(),
            body: body.into(),
            recipient: Some(recipient.into()),
        }
    }

    /// Create a system message attributed to `sender`
    ///
    /// The dispatcher skips the session named `sender`.
    pub fn system(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::System,
            sender: sender.into(),
            body: body.into(),
            recipient: None,
        }
    }

    /// Presence notice for a newly registered session, hidden from that session
    pub fn joined(username: &Username) -> Self {
        Self::system(username.as_str(), format!("{} has joined the chat.", username))
    }

    /// Departure notice for a deregistered session
    pub fn left(username: &Username) -> Self {
        Self::system(SYSTEM_SENDER, format!("{} has left the chat.", username))
    }

    /// Recipient name, if present and non-empty
    pub fn recipient(&self) -> Option<&str> {
        self.recipient.as_deref().filter(|to| !to.is_empty())
    }

    /// Shape of this message as relayed to other sessions
    ///
    /// Only private messages keep their `to` field.
    pub fn into_relay(mut self) -> Self {
        if self.kind != MessageKind::Private {
            self.recipient = None;
        }
        self
    }
}

/// Server → Client message
///
/// Untagged: chat traffic keeps the `ChatMessage` shape, while notices and
/// error acknowledgments are single-field objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// Relayed chat or system message
    Chat(ChatMessage),
    /// Direct notice, e.g. `{"message": "You have connected as Fig3"}`
    Notice { message: String },
    /// Rejection, e.g. `{"error": "invalid message type"}`
    Error { error: String },
}

impl ServerMessage {
    /// Welcome notice, the first message written to a newly registered stream
    pub fn welcome(username: &Username) -> Self {
        ServerMessage::Notice {
            message: format!("You have connected as {}", username),
        }
    }

    /// Rejection of a frame that is not a valid chat message
    pub fn malformed(detail: impl std::fmt::Display) -> Self {
        ServerMessage::Error {
            error: format!("invalid message format: {}", detail),
        }
    }
}

impl From<ChatMessage> for ServerMessage {
    fn from(msg: ChatMessage) -> Self {
        ServerMessage::Chat(msg)
    }
}

/// Convert a validation failure into the acknowledgment sent to its sender
impl From<&ValidationError> for ServerMessage {
    fn from(err: &ValidationError) -> Self {
        ServerMessage::Error {
            error: err.to_string(),
        }
    }
}

impl From<&HubError> for ServerMessage {
    fn from(err: &HubError) -> Self {
        match err {
            HubError::Validation(e) => e.into(),
            HubError::CapacityExceeded => ServerMessage::Error {
                error: err.to_string(),
            },
            // Transport failures are not typically reported (connection closes)
            _ => ServerMessage::Error {
                error: "internal error".to_string(),
            },
        }
    }
}
