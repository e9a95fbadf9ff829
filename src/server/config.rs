//! Server configuration

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Default bind host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default listening port
pub const DEFAULT_PORT: u16 = 8765;

/// Default WebSocket route
pub const DEFAULT_ROUTE: &str = "/data";

/// Server configuration options
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Host name or address to bind to
    pub host: String,

    /// Port to bind to (0 = OS assigned)
    pub port: u16,

    /// Required request path; empty accepts any path
    pub route: String,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Time allowed for the WebSocket upgrade plus the subscription message
    pub handshake_timeout: Duration,

    /// A single socket write taking longer than this drops the connection
    pub send_timeout: Duration,

    /// Frames queued per connection before it is considered too slow
    pub subscriber_queue_capacity: usize,

    /// Send the cached value to a new subscriber right after the success frame
    pub replay_cached: bool,

    /// How long `stop` waits for the network thread
    pub shutdown_timeout: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            route: DEFAULT_ROUTE.to_string(),
            max_connections: 0, // Unlimited
            handshake_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(5),
            subscriber_queue_capacity: 256,
            replay_cached: true,
            shutdown_timeout: Duration::from_secs(5),
            tcp_nodelay: true, // Updates are small and latency sensitive
        }
    }
}

impl ServerConfig {
    /// Create a config for the given endpoint
    pub fn new(host: impl Into<String>, port: u16, route: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            route: route.into(),
            ..Default::default()
        }
    }

    /// Set the bind host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the bind port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the required route
    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.route = route.into();
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set per-write send timeout
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Set the per-connection queue capacity (at least 1)
    pub fn subscriber_queue_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_queue_capacity = capacity.max(1);
        self
    }

    /// Do not send the cached value to new subscribers
    pub fn disable_replay(mut self) -> Self {
        self.replay_cached = false;
        self
    }

    /// Set shutdown timeout
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Whether incoming request paths are checked
    pub fn requires_route(&self) -> bool {
        !self.route.is_empty()
    }

    /// URL clients connect to
    pub fn url(&self) -> String {
        format!("ws://{}:{}{}", self.host, self.port, self.route)
    }

    /// Parse a JSON settings document
    ///
    /// Endpoint values are read from the `WEBSOCKET_CONFIG` section
    /// (`HOST`, `PORT`, `ROUTE_PATH`); anything missing keeps its default.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let doc: SettingsDocument = serde_json::from_str(json)?;
        let mut config = Self::default();

        if let Some(section) = doc.websocket {
            if let Some(host) = section.host {
                config.host = host;
            }
            if let Some(port) = section.port {
                config.port = port.into_port()?;
            }
            if let Some(route) = section.route {
                config.route = route;
            }
        }

        Ok(config)
    }

    /// Load a JSON settings file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[derive(Deserialize)]
struct SettingsDocument {
    #[serde(rename = "WEBSOCKET_CONFIG")]
    websocket: Option<WebSocketSection>,
}

#[derive(Deserialize)]
struct WebSocketSection {
    #[serde(rename = "HOST")]
    host: Option<String>,
    #[serde(rename = "PORT")]
    port: Option<PortValue>,
    #[serde(rename = "ROUTE_PATH", alias = "ROUTE")]
    route: Option<String>,
}

/// Ports appear both as numbers and as strings in settings files
#[derive(Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u16),
    Text(String),
}

impl PortValue {
    fn into_port(self) -> Result<u16> {
        match self {
            PortValue::Number(port) => Ok(port),
            PortValue::Text(text) => Ok(serde_json::from_str(text.trim())?),
        }
    }
}
