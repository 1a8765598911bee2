//! Client struct definition
//!
//! Represents a registered session as seen by the registry: its username and
//! the stream that reaches it.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::TransportError;
use crate::message::ServerMessage;
use crate::transport::ChatStream;
use crate::types::Username;

/// Registered client
///
/// The stream is owned by the session handler; the registry and the
/// dispatcher hold it through this shared handle. Every write goes through
/// `write_lock`, so the dispatcher, private senders and the session itself
/// never interleave on one stream.
pub struct Client {
    /// Assigned username
    pub username: Username,
    stream: Arc<dyn ChatStream>,
    write_lock: Mutex<()>,
}

impl Client {
    /// Create a client for the given username and stream
    pub fn new(username: Username, stream: Arc<dyn ChatStream>) -> Self {
        Self {
            username,
            stream,
            write_lock: Mutex::new(()),
        }
    }

    /// Send a message to this client
    ///
    /// Waits for any other write to this client to finish first.
    pub async fn send(&self, msg: &ServerMessage) -> Result<(), TransportError> {
        let _guard = self.write_lock.lock().await;
        self.stream.write_message(msg).await
    }

    /// Close the underlying stream
    pub async fn close(&self) -> Result<(), TransportError> {
        self.stream.close().await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
