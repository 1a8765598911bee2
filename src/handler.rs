//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake, then the
//! session lifecycle `Connecting → Active → Closing → Closed`.

use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, error, info, warn};

use crate::client::Client;
use crate::error::{AppError, HubError};
use crate::hub::Hub;
use crate::message::ServerMessage;
use crate::transport::{ChatStream, Inbound, WsStream};
use crate::types::ConnectionId;

/// Lifecycle of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Upgraded, not yet registered
    Connecting,
    /// Registered, relaying messages
    Active,
    /// Stream ended, tearing down
    Closing,
    /// Terminal
    Closed,
}

/// Per-connection control loop
pub struct Session {
    id: ConnectionId,
    hub: Hub,
    stream: Arc<dyn ChatStream>,
    state: SessionState,
}

impl Session {
    /// Create a session for an upgraded stream
    pub fn new(id: ConnectionId, hub: Hub, stream: Arc<dyn ChatStream>) -> Self {
        Self {
            id,
            hub,
            stream,
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }

    /// Drive the session until its stream ends
    ///
    /// Returns the registration error when the session never became active
    /// (`CapacityExceeded` when the hub was full); the peer has then been told
    /// so and the stream is closed. Once active, the outcome is always `Ok`.
    pub async fn run(&mut self) -> Result<(), HubError> {
        let client = match self.hub.register(self.stream.clone()).await {
            Ok(client) => client,
            Err(e) => {
                self.reject(&e).await;
                return Err(e);
            }
        };
        info!("Session {} registered as {}", self.id, client.username);
        self.transition(SessionState::Active);

        self.relay(&client).await;

        self.transition(SessionState::Closing);
        self.hub.deregister(&client.username).await;
        if let Err(e) = client.close().await {
            debug!("Closing stream of {} failed: {}", client.username, e);
        }
        self.transition(SessionState::Closed);
        info!("Session {} ({}) closed", self.id, client.username);

        Ok(())
    }

    /// Tell an unregistered peer why it was refused and close its stream
    async fn reject(&mut self, err: &HubError) {
        warn!("Session {} rejected: {}", self.id, err);
        if let Err(e) = self.stream.write_message(&ServerMessage::from(err)).await {
            debug!("Failed to notify rejected session {}: {}", self.id, e);
        }
        if let Err(e) = self.stream.close().await {
            debug!("Closing rejected session {} failed: {}", self.id, e);
        }
        self.transition(SessionState::Closed);
    }

    /// Active state: read, validate and route until the stream ends
    ///
    /// Rejected messages are answered on the sender's own stream only; just
    /// transport errors end the loop.
    async fn relay(&self, client: &Client) {
        let username = &client.username;
        loop {
            let reply = match self.stream.read_message().await {
                Ok(Inbound::Message(msg)) => match self.hub.handle_message(msg, username).await {
                    Ok(()) => continue,
                    Err(HubError::Validation(e)) => {
                        debug!("Rejected message from {}: {}", username, e);
                        ServerMessage::from(&e)
                    }
                    Err(e) => {
                        error!("Cannot relay message from {}: {}", username, e);
                        break;
                    }
                },
                Ok(Inbound::Malformed(detail)) => {
                    debug!("Malformed frame from {}: {}", username, detail);
                    ServerMessage::malformed(detail)
                }
                Ok(Inbound::Closed) => {
                    info!("Connection of {} closed", username);
                    break;
                }
                Err(e) => {
                    warn!("Error reading from {}: {}", username, e);
                    break;
                }
            };

            if let Err(e) = client.send(&reply).await {
                warn!("Error sending error message to {}: {}", username, e);
            }
        }
    }
}

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake (only on `path`) and runs the session.
pub async fn handle_connection(stream: TcpStream, hub: Hub, path: &str) -> Result<(), AppError> {
    let id = ConnectionId::new();
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("Connection {} from {}", id, peer_addr);

    let expected = path.to_string();
    let check_path = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        if req.uri().path() == expected {
            Ok(resp)
        } else {
            let mut reject =
                ErrorResponse::new(Some(format!("no WebSocket endpoint at {}", req.uri().path())));
            *reject.status_mut() = StatusCode::NOT_FOUND;
            Err(reject)
        }
    };

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, check_path).await?;
    info!("Connection {} from {} upgraded", id, peer_addr);

    let stream: Arc<dyn ChatStream> = Arc::new(WsStream::new(ws_stream));
    match Session::new(id, hub, stream).run().await {
        // Turning away a peer on a full hub is routine; already logged
        Ok(()) | Err(HubError::CapacityExceeded) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
