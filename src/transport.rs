//! Transport boundary
//!
//! The hub talks to every participant through a `ChatStream`: a blocking
//! read of the next chat message, a write of any server message, and close.
//! `WsStream` implements it over an upgraded tokio-tungstenite connection.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

use crate::error::TransportError;
use crate::message::{ChatMessage, ServerMessage};

/// Result of reading one frame from a stream
#[derive(Debug)]
pub enum Inbound {
    /// A well-formed chat message
    Message(ChatMessage),
    /// A text frame that is not a chat message; carries the parse error
    Malformed(String),
    /// The peer closed the stream cleanly
    Closed,
}

/// Bidirectional message stream of one participant
///
/// Reads happen from the owning session handler only. Writes may come from
/// several tasks; callers serialize them (see `Client`).
#[async_trait]
pub trait ChatStream: Send + Sync {
    /// Wait for the next inbound message
    async fn read_message(&self) -> Result<Inbound, TransportError>;

    /// Write one message to the peer
    async fn write_message(&self, msg: &ServerMessage) -> Result<(), TransportError>;

    /// Close the stream; a pending `read_message` then resolves
    async fn close(&self) -> Result<(), TransportError>;
}

/// Longest a single write or close may wait on a peer that stopped reading
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// `ChatStream` over a WebSocket connection
pub struct WsStream<S> {
    sink: Mutex<SplitSink<WebSocketStream<S>, Message>>,
    stream: Mutex<SplitStream<WebSocketStream<S>>>,
    write_timeout: Duration,
}

impl<S> WsStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap an already upgraded WebSocket connection
    pub fn new(ws: WebSocketStream<S>) -> Self {
        let (sink, stream) = ws.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Bound every write and close by `timeout` instead of the default
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

/// Errors that only mean the connection is already gone
fn is_closed_error(err: &tungstenite::Error) -> bool {
    matches!(
        err,
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed
    )
}

#[async_trait]
impl<S> ChatStream for WsStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn read_message(&self) -> Result<Inbound, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(match serde_json::from_str::<ChatMessage>(&text) {
                        Ok(msg) => Inbound::Message(msg),
                        Err(e) => Inbound::Malformed(e.to_string()),
                    });
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("Peer sent close frame: {:?}", frame);
                    return Ok(Inbound::Closed);
                }
                // Pong is handled automatically by tungstenite
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                // Binary or raw frames - ignore
                Some(Ok(_)) => {}
                Some(Err(e)) if is_closed_error(&e) => return Ok(Inbound::Closed),
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(Inbound::Closed),
            }
        }
    }

    async fn write_message(&self, msg: &ServerMessage) -> Result<(), TransportError> {
        let json = serde_json::to_string(msg)?;
        let write = async {
            let mut sink = self.sink.lock().await;
            sink.send(Message::Text(json.into())).await
        };
        tokio::time::timeout(self.write_timeout, write)
            .await
            .map_err(|_| TransportError::Timeout(self.write_timeout))??;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        let close = async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        };
        match tokio::time::timeout(self.write_timeout, close).await {
            Err(_) => Err(TransportError::Timeout(self.write_timeout)),
            Ok(Err(e)) if !is_closed_error(&e) => Err(e.into()),
            Ok(_) => Ok(()),
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory `ChatStream` for tests.

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use tokio::sync::{mpsc, watch};

    use super::*;

    pub(crate) type Frame = Result<Inbound, TransportError>;

    /// Stream half handed to the hub
    pub(crate) struct MockStream {
        inbound: Mutex<mpsc::UnboundedReceiver<Frame>>,
        outbound: mpsc::UnboundedSender<ServerMessage>,
        fail_writes: AtomicBool,
        closed: watch::Sender<bool>,
    }

    /// Test-side end: feeds frames in and observes what the hub wrote
    pub(crate) struct MockPeer {
        inbound: mpsc::UnboundedSender<Frame>,
        outbound: mpsc::UnboundedReceiver<ServerMessage>,
    }

    pub(crate) fn pair() -> (Arc<MockStream>, MockPeer) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        let stream = MockStream {
            inbound: Mutex::new(in_rx),
            outbound: out_tx,
            fail_writes: AtomicBool::new(false),
            closed,
        };
        let peer = MockPeer {
            inbound: in_tx,
            outbound: out_rx,
        };
        (Arc::new(stream), peer)
    }

    /// WebSocket stream whose peer never reads; writes past the small pipe
    /// buffer block until `write_timeout` expires. Keep the returned peer
    /// alive for as long as the stream is in use.
    pub(crate) async fn stalled(
        write_timeout: Duration,
    ) -> (
        Arc<WsStream<tokio::io::DuplexStream>>,
        WebSocketStream<tokio::io::DuplexStream>,
    ) {
        use tokio_tungstenite::tungstenite::protocol::Role;

        let (server_io, client_io) = tokio::io::duplex(256);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        (
            Arc::new(WsStream::new(server).with_write_timeout(write_timeout)),
            client,
        )
    }

    impl MockStream {
        pub(crate) fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub(crate) fn is_closed(&self) -> bool {
            *self.closed.borrow()
        }
    }

    #[async_trait]
    impl ChatStream for MockStream {
        async fn read_message(&self) -> Result<Inbound, TransportError> {
            let mut closed = self.closed.subscribe();
            let already_closed = *closed.borrow_and_update();
            if already_closed {
                return Ok(Inbound::Closed);
            }
            let mut inbound = self.inbound.lock().await;
            tokio::select! {
                _ = closed.changed() => Ok(Inbound::Closed),
                frame = inbound.recv() => frame.unwrap_or(Ok(Inbound::Closed)),
            }
        }

        async fn write_message(&self, msg: &ServerMessage) -> Result<(), TransportError> {
            if self.fail_writes.load(Ordering::SeqCst) || self.is_closed() {
                return Err(TransportError::Closed);
            }
            let _ = self.outbound.send(msg.clone());
            Ok(())
        }

        async fn close(&self) -> Result<(), TransportError> {
            self.closed.send_replace(true);
            Ok(())
        }
    }

    impl MockPeer {
        /// Deliver a chat message to the hub
        pub(crate) fn send(&self, msg: ChatMessage) {
            let _ = self.inbound.send(Ok(Inbound::Message(msg)));
        }

        /// Deliver an arbitrary frame or transport error
        pub(crate) fn send_frame(&self, frame: Frame) {
            let _ = self.inbound.send(frame);
        }

        /// Next message written by the hub; panics after one second
        pub(crate) async fn recv(&mut self) -> ServerMessage {
            tokio::time::timeout(Duration::from_secs(1), self.outbound.recv())
                .await
                .expect("timed out waiting for message")
                .expect("stream dropped")
        }

        /// Asserts nothing more is written within a short window
        pub(crate) async fn assert_silent(&mut self) {
            let next = tokio::time::timeout(Duration::from_millis(100), self.outbound.recv()).await;
            if let Ok(Some(msg)) = next {
                panic!("unexpected message: {:?}", msg);
            }
        }
    }
}
