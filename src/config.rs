//! Server and hub configuration
//!
//! Every setting can come from a command-line flag or its environment
//! variable, falling back to the defaults below.

use clap::Parser;

/// Default bind address
pub const DEFAULT_ADDR: &str = "0.0.0.0:8086";

/// Default WebSocket endpoint path
pub const DEFAULT_PATH: &str = "/ws";

/// Default maximum number of simultaneous sessions
pub const DEFAULT_MAX_CLIENTS: usize = 5;

/// Default broadcast queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Live chat server.
#[derive(Parser, Debug, Clone)]
#[command(name = "live_chat", about = "Multi-user WebSocket live chat server")]
pub struct ServerConfig {
    /// Address to bind.
    #[arg(long, env = "LIVE_CHAT_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: String,

    /// Request path accepted for the WebSocket upgrade.
    #[arg(long, env = "LIVE_CHAT_PATH", default_value = DEFAULT_PATH)]
    pub path: String,

    #[command(flatten)]
    pub hub: HubConfig,
}

/// Settings fixed at hub construction time
#[derive(clap::Args, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Maximum number of simultaneously registered sessions.
    #[arg(long, env = "LIVE_CHAT_MAX_CLIENTS", default_value_t = DEFAULT_MAX_CLIENTS)]
    pub max_clients: usize,

    /// Capacity of the broadcast queue (at least 1); producers wait while it is full.
    #[arg(long, env = "LIVE_CHAT_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
}

impl HubConfig {
    /// Config with the given capacity and the default queue size
    pub fn with_max_clients(max_clients: usize) -> Self {
        Self {
            max_clients,
            ..Self::default()
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_clients: DEFAULT_MAX_CLIENTS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}
