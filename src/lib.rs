//! Multi-user WebSocket Live Chat Library
//!
//! A chat hub built on tokio-tungstenite: every connected participant gets a
//! generated username, public messages are broadcast to everyone else in
//! order, and private messages go straight to one recipient.
//!
//! # Features
//! - Server-generated unique usernames
//! - Bounded number of simultaneous sessions
//! - Public broadcast, excluding the sender
//! - Private messages to a registered user
//! - Join/leave notices
//! - Per-message validation with inline error replies
//!
//! # Architecture
//! - `Registry` maps usernames to clients behind a single lock
//! - One `Dispatcher` task drains a bounded broadcast queue, FIFO per recipient
//! - One `Session` task per connection reads, validates and routes messages
//! - Writes to a stream are serialized by its `Client`, and the registry lock
//!   is never held across a write
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use live_chat::{handle_connection, Hub, HubConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8086").await.unwrap();
//!     let (hub, dispatcher) = Hub::new(HubConfig::default());
//!
//!     tokio::spawn(dispatcher.run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         let hub = hub.clone();
//!         tokio::spawn(async move { handle_connection(stream, hub, "/ws").await });
//!     }
//! }
//! ```

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod hub;
pub mod message;
pub mod registry;
pub mod transport;
pub mod types;
pub mod validator;

// Re-export main types for convenience
pub use client::Client;
pub use config::{HubConfig, ServerConfig};
pub use dispatcher::Dispatcher;
pub use error::{AppError, HubError, TransportError, ValidationError};
pub use handler::{handle_connection, Session, SessionState};
pub use hub::Hub;
pub use message::{ChatMessage, MessageKind, ServerMessage};
pub use registry::{Registry, Reservation};
pub use transport::{ChatStream, Inbound, WsStream, DEFAULT_WRITE_TIMEOUT};
pub use types::{ConnectionId, Username};
pub use validator::validate;
