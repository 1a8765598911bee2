//! Chat hub
//!
//! In-process coordinator of all sessions: owns the registry and the producer
//! side of the broadcast queue. Cloning a `Hub` is cheap and every clone
//! shares the same registry and dispatcher.
//!
//! Lock order: the registry lock is always released before a client write
//! lock is taken, so the two can never deadlock.

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::client::Client;
use crate::config::HubConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{HubError, ValidationError};
use crate::message::{ChatMessage, MessageKind, ServerMessage};
use crate::registry::Registry;
use crate::transport::ChatStream;
use crate::types::Username;
use crate::validator;

/// Handle to one chat deployment
#[derive(Clone)]
pub struct Hub {
    registry: Arc<Registry>,
    /// Broadcast queue sender
    queue: mpsc::Sender<ChatMessage>,
}

impl Hub {
    /// Create a hub and its broadcast dispatcher
    ///
    /// The dispatcher must be spawned (`tokio::spawn(dispatcher.run())`)
    /// before broadcasts are delivered.
    pub fn new(config: HubConfig) -> (Self, Dispatcher) {
        let registry = Arc::new(Registry::new(config.max_clients));
        let (queue, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let dispatcher = Dispatcher::new(receiver, registry.clone());
        (Self { registry, queue }, dispatcher)
    }

    /// Register a stream, welcome it, and announce it to everyone else
    ///
    /// The welcome notice is written before the client becomes visible to the
    /// dispatcher or to private senders, so it is always the first message
    /// on the stream. On error nothing stays registered and nothing is
    /// announced; notifying and closing the stream is up to the caller.
    pub async fn register(&self, stream: Arc<dyn ChatStream>) -> Result<Arc<Client>, HubError> {
        let reservation = self.registry.reserve()?;
        stream
            .write_message(&ServerMessage::welcome(reservation.username()))
            .await?;
        let client = reservation.complete(stream);

        if let Err(e) = self.enqueue(ChatMessage::joined(&client.username)).await {
            self.registry.deregister(client.username.as_str());
            return Err(e);
        }
        Ok(client)
    }

    /// Remove a session and announce its departure to the remaining ones
    ///
    /// Returns false, announcing nothing, when the username was not registered.
    /// The stream is not closed here.
    pub async fn deregister(&self, username: &Username) -> bool {
        if self.registry.deregister(username.as_str()).is_none() {
            return false;
        }
        if let Err(e) = self.enqueue(ChatMessage::left(username)).await {
            warn!("Departure of {} not announced: {}", username, e);
        }
        true
    }

    /// Queue a message for broadcast
    ///
    /// Waits while the queue is full.
    pub async fn enqueue(&self, msg: ChatMessage) -> Result<(), HubError> {
        self.queue.send(msg).await.map_err(|_| HubError::QueueClosed)
    }

    /// Validate a message against the current registry
    pub fn validate(&self, msg: &ChatMessage, sender: &Username) -> Result<(), ValidationError> {
        validator::validate(msg, sender.as_str(), |to| self.registry.exists(to))
    }

    /// Validate and route one inbound message from `sender`
    ///
    /// Public messages go through the broadcast queue. Private messages are
    /// written straight to the recipient; a failed write there is logged and
    /// left to the recipient's own handler, not reported to the sender.
    pub async fn handle_message(&self, msg: ChatMessage, sender: &Username) -> Result<(), HubError> {
        self.validate(&msg, sender)?;

        match msg.kind {
            MessageKind::Private => {
                let recipient = msg
                    .recipient()
                    .and_then(|to| self.registry.get(to))
                    // Recipient left after validation
                    .ok_or(ValidationError::RecipientNotFound)?;

                if let Err(e) = recipient.send(&ServerMessage::Chat(msg)).await {
                    warn!("Failed to send private message to {}: {}", recipient.username, e);
                } else {
                    debug!("Private message from {} to {}", sender, recipient.username);
                }
                Ok(())
            }
            _ => self.enqueue(msg.into_relay()).await,
        }
    }

    /// Check whether a username is currently registered
    pub fn exists(&self, username: &str) -> bool {
        self.registry.exists(username)
    }

    /// Registered usernames in sorted order
    pub fn active_users(&self) -> Vec<Username> {
        self.registry.usernames()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn max_clients(&self) -> usize {
        self.registry.max_clients()
    }

    /// Close every registered stream
    ///
    /// Session handlers then leave through their normal closing path.
    pub async fn shutdown(&self) {
        let clients = self.registry.snapshot();
        debug!("Closing {} sessions", clients.len());
        let closes = clients.iter().map(|client| async move {
            if let Err(e) = client.close().await {
                warn!("Failed to close stream of {}: {}", client.username, e);
            }
        });
        join_all(closes).await;
    }
}
