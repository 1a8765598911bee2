//! Integration tests for the live chat server over real WebSocket connections.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use live_chat::{handle_connection, Hub, HubConfig};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Helper: start a server on a random port, return its address and hub.
async fn start_test_server(max_clients: usize) -> (SocketAddr, Hub) {
    let (hub, dispatcher) = Hub::new(HubConfig::with_max_clients(max_clients));
    tokio::spawn(dispatcher.run());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_hub = hub.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let hub = server_hub.clone();
            tokio::spawn(async move {
                let _ = handle_connection(stream, hub, "/ws").await;
            });
        }
    });

    (addr, hub)
}

async fn connect(addr: SocketAddr) -> Ws {
    let (ws, _) = connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("Failed to connect");
    ws
}

/// Next text frame as JSON, failing after two seconds.
async fn next_json(ws: &mut Ws) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("Timed out waiting for message")
            .expect("Stream ended")
            .expect("WebSocket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).expect("Invalid JSON from server");
        }
    }
}

/// Next message that is not a join notice.
async fn next_non_join(ws: &mut Ws) -> Value {
    loop {
        let msg = next_json(ws).await;
        let is_join = msg["type"] == "system"
            && msg["message"]
                .as_str()
                .is_some_and(|m| m.ends_with("has joined the chat."));
        if !is_join {
            return msg;
        }
    }
}

/// Connect and return the socket plus the username from the welcome notice.
async fn join(addr: SocketAddr) -> (Ws, String) {
    let mut ws = connect(addr).await;
    let welcome = next_json(&mut ws).await;
    let name = welcome["message"]
        .as_str()
        .and_then(|m| m.strip_prefix("You have connected as "))
        .expect("Expected welcome notice")
        .to_string();
    (ws, name)
}

async fn send_json(ws: &mut Ws, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

/// Assert no text frame arrives within a short window.
async fn assert_silent(ws: &mut Ws) {
    if let Ok(Some(Ok(Message::Text(text)))) =
        tokio::time::timeout(Duration::from_millis(200), ws.next()).await
    {
        panic!("Unexpected message: {}", text);
    }
}

#[tokio::test]
async fn test_chat_scenario() {
    let (addr, hub) = start_test_server(2).await;

    let (mut a, name_a) = join(addr).await;
    let (mut b, name_b) = join(addr).await;

    let joined = next_json(&mut a).await;
    assert_eq!(
        joined,
        json!({"type": "system", "username": name_b, "message": format!("{} has joined the chat.", name_b)})
    );
    assert_eq!(hub.len(), 2);

    // Third client is turned away
    let mut c = connect(addr).await;
    assert_eq!(
        next_json(&mut c).await,
        json!({"error": "server is full, please try again later"})
    );
    assert_eq!(hub.len(), 2);

    // Public message
    send_json(&mut a, json!({"type": "chat", "username": name_a, "message": "hi"})).await;
    assert_eq!(
        next_non_join(&mut b).await,
        json!({"type": "chat", "username": name_a, "message": "hi"})
    );
    assert_silent(&mut a).await;

    // Private message
    send_json(
        &mut a,
        json!({"type": "private", "username": name_a, "message": "secret", "to": name_b}),
    )
    .await;
    assert_eq!(
        next_non_join(&mut b).await,
        json!({"type": "private", "username": name_a, "message": "secret", "to": name_b})
    );

    // A leaves
    a.close(None).await.unwrap();
    assert_eq!(
        next_non_join(&mut b).await,
        json!({"type": "system", "username": "System", "message": format!("{} has left the chat.", name_a)})
    );
    assert_eq!(hub.active_users().len(), 1);
}

#[tokio::test]
async fn test_rejections_are_private() {
    let (addr, _hub) = start_test_server(3).await;

    let (mut a, name_a) = join(addr).await;
    let (mut b, name_b) = join(addr).await;
    next_json(&mut a).await; // B joined

    send_json(&mut a, json!({"type": "chat", "username": name_b, "message": "spoof"})).await;
    assert_eq!(
        next_json(&mut a).await,
        json!({"error": format!("invalid username: you are not registered as {}", name_b)})
    );

    send_json(
        &mut a,
        json!({"type": "private", "username": name_a, "message": "hello?", "to": "Nobody0"}),
    )
    .await;
    assert_eq!(
        next_json(&mut a).await,
        json!({"error": "recipient does not exist or is not online"})
    );

    send_json(&mut a, json!({"type": "system", "username": name_a, "message": "fake"})).await;
    assert_eq!(next_json(&mut a).await, json!({"error": "invalid message type"}));

    a.send(Message::Text("not json".to_string().into())).await.unwrap();
    let reply = next_json(&mut a).await;
    assert!(reply["error"]
        .as_str()
        .is_some_and(|e| e.starts_with("invalid message format")));

    // Session survives and B saw none of it
    send_json(&mut a, json!({"type": "chat", "username": name_a, "message": "still here"})).await;
    assert_eq!(
        next_non_join(&mut b).await,
        json!({"type": "chat", "username": name_a, "message": "still here"})
    );
}

#[tokio::test]
async fn test_unknown_path_rejected() {
    let (addr, hub) = start_test_server(2).await;

    let err = connect_async(format!("ws://{}/other", addr)).await.unwrap_err();
    match err {
        tungstenite::Error::Http(resp) => assert_eq!(resp.status(), 404),
        other => panic!("Unexpected error: {}", other),
    }
    assert!(hub.is_empty());
}

#[tokio::test]
async fn test_shutdown_closes_clients() {
    let (addr, hub) = start_test_server(2).await;
    let (mut a, _) = join(addr).await;

    hub.shutdown().await;

    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match a.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}
