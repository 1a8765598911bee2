//! Broadcast dispatcher
//!
//! The single consumer of the broadcast queue. Each dequeued message is
//! written to every registered client except its sender before the next one
//! is taken, which keeps delivery FIFO for every recipient.

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::message::{ChatMessage, ServerMessage};
use crate::registry::Registry;

/// Broadcast worker
///
/// Created together with its `Hub`; `run` consumes it, so at most one worker
/// exists per hub.
pub struct Dispatcher {
    /// Broadcast queue receiver
    receiver: mpsc::Receiver<ChatMessage>,
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub(crate) fn new(receiver: mpsc::Receiver<ChatMessage>, registry: Arc<Registry>) -> Self {
        Self { receiver, registry }
    }

    /// Run the dispatch loop
    ///
    /// Returns once every queue sender is dropped and the queue is drained.
    pub async fn run(mut self) {
        info!("Dispatcher started");

        while let Some(msg) = self.receiver.recv().await {
            self.deliver(msg).await;
        }

        info!("Dispatcher shutting down");
    }

    /// Write one message to all registered clients but its sender
    ///
    /// Failed writes are logged only; the failing session is cleaned up by its
    /// own handler when its next read fails.
    async fn deliver(&self, msg: ChatMessage) {
        // Snapshot releases the registry lock before any write
        let recipients = self.registry.snapshot();
        let sender = msg.sender.clone();
        let outbound = ServerMessage::Chat(msg);

        let writes = recipients
            .iter()
            .filter(|client| client.username.as_str() != sender)
            .map(|client| {
                let sender = sender.as_str();
                let outbound = &outbound;
                async move {
                    match client.send(outbound).await {
                        Ok(()) => debug!("Delivered message from {} to {}", sender, client.username),
                        Err(e) => warn!("Failed to send message to {}: {}", client.username, e),
                    }
                }
            });
        join_all(writes).await;
    }
}
