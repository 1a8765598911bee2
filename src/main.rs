//! Live Chat Server - Entry Point
//!
//! Starts the TCP listener and the hub's dispatcher, accepting connections
//! until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use live_chat::{handle_connection, Hub, ServerConfig};

/// How long sessions get to wind down after shutdown starts
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=live_chat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("live_chat=info")),
        )
        .init();

    let config = ServerConfig::parse();

    // Start TCP listener
    let listener = TcpListener::bind(&config.addr).await?;
    info!(
        "Live chat server listening on ws://{}{} (max {} clients)",
        config.addr, config.path, config.hub.max_clients
    );

    // Create the hub and start its dispatcher
    let (hub, dispatcher) = Hub::new(config.hub);
    let dispatcher = tokio::spawn(dispatcher.run());

    let path: Arc<str> = Arc::from(config.path.as_str());

    // Connection accept loop
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let hub = hub.clone();
                    let path = path.clone();

                    // Spawn handler task for each connection
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, hub, &path).await {
                            error!("Connection handler error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    if tokio::time::timeout(SHUTDOWN_GRACE, hub.shutdown()).await.is_err() {
        warn!("Closing streams did not finish within {:?}", SHUTDOWN_GRACE);
    }
    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while !hub.is_empty() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    if drained.is_err() {
        warn!("{} sessions still open after {:?}", hub.len(), SHUTDOWN_GRACE);
    }

    // Last producer gone: the dispatcher drains the queue and stops
    drop(hub);
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, dispatcher).await;

    info!("Live chat server stopped");
    Ok(())
}
