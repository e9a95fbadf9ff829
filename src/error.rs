//! Error types
//!
//! Only startup and configuration loading surface errors to the caller.
//! Everything that happens once the server is running (protocol rejections,
//! transport failures, invalid payloads) is logged and absorbed; per-connection
//! errors end that connection only.

use std::io;

/// Result type alias for chartcast operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Binding the listener, spawning the network thread or building the runtime failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The network thread exited before reporting readiness
    #[error("server thread exited before the listener was ready")]
    StartupAborted,

    /// WebSocket upgrade or framing error on a single connection
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Client did not finish the upgrade or subscription in time
    #[error("handshake timed out")]
    HandshakeTimeout,

    /// Configuration document could not be parsed
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
