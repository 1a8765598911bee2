//! Inbound message validation
//!
//! Decides whether a client message is well-formed and permitted for the
//! session that sent it. Registry state is consulted only through the
//! `recipient_exists` callback; nothing is mutated.

use crate::error::ValidationError;
use crate::message::{ChatMessage, MessageKind};

/// Maximum body length, in characters
pub const MAX_MESSAGE_LEN: usize = 500;

/// Validate `msg` as sent by the session registered as `asserted_sender`
///
/// Checks run in a fixed order and the first failure is returned:
/// empty body, empty sender, length, kind, identity, then recipient
/// (private messages only).
pub fn validate(
    msg: &ChatMessage,
    asserted_sender: &str,
    recipient_exists: impl FnOnce(&str) -> bool,
) -> Result<(), ValidationError> {
    if msg.body.trim().is_empty() {
        return Err(ValidationError::EmptyMessage);
    }

    if asserted_sender.trim().is_empty() || msg.sender.trim().is_empty() {
        return Err(ValidationError::EmptySender);
    }

    if msg.body.chars().count() > MAX_MESSAGE_LEN {
        return Err(ValidationError::MessageTooLong);
    }

    // System messages are server-generated only
    if !matches!(msg.kind, MessageKind::Public | MessageKind::Private) {
        return Err(ValidationError::InvalidKind);
    }

    if msg.sender != asserted_sender {
        return Err(ValidationError::IdentityMismatch(msg.sender.clone()));
    }

    if msg.kind == MessageKind::Private {
        let recipient = msg.recipient().ok_or(ValidationError::EmptyRecipient)?;
        if !recipient_exists(recipient) {
            return Err(ValidationError::RecipientNotFound);
        }
    }

    Ok(())
}
