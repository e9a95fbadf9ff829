//! Connection state machine
//!
//! Tracks a client connection from accept to close.
//!
//! ```text
//!   Connecting ──► AwaitingSubscription ──► Subscribed ──► Closed
//!        │                  │                                ▲
//!        └──────────────────┴──────► Rejected ───────────────┘
//! ```

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::registry::StreamKey;

/// Connection lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// TCP accepted, WebSocket upgrade in progress
    Connecting,
    /// Upgrade complete, waiting for the subscription message
    AwaitingSubscription,
    /// Bound to a stream key, receiving updates
    Subscribed,
    /// Handshake refused, failure frame and close pending
    Rejected,
    /// Connection closed
    Closed,
}

/// Per-connection state
#[derive(Debug)]
pub struct ConnectionState {
    /// Unique connection ID
    pub id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Current phase
    pub phase: ConnectionPhase,

    /// Accept time
    pub connected_at: Instant,

    /// Time the subscription was accepted
    pub subscribed_at: Option<Instant>,

    /// Stream this connection is bound to, fixed once set
    stream: Option<StreamKey>,

    /// Frames written to the socket after subscribing
    pub frames_sent: u64,
}

impl ConnectionState {
    /// Create a new connection state
    pub fn new(id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            phase: ConnectionPhase::Connecting,
            connected_at: Instant::now(),
            subscribed_at: None,
            stream: None,
            frames_sent: 0,
        }
    }

    /// WebSocket upgrade completed
    pub fn on_upgraded(&mut self) {
        if self.phase == ConnectionPhase::Connecting {
            self.phase = ConnectionPhase::AwaitingSubscription;
        }
    }

    /// Bind to a stream
    ///
    /// Only valid while awaiting the subscription; a connection is never
    /// re-bound. Returns whether the binding took place.
    pub fn on_subscribed(&mut self, key: StreamKey) -> bool {
        if self.phase != ConnectionPhase::AwaitingSubscription {
            return false;
        }
        self.phase = ConnectionPhase::Subscribed;
        self.stream = Some(key);
        self.subscribed_at = Some(Instant::now());
        true
    }

    /// Handshake refused
    pub fn reject(&mut self) {
        if matches!(
            self.phase,
            ConnectionPhase::Connecting | ConnectionPhase::AwaitingSubscription
        ) {
            self.phase = ConnectionPhase::Rejected;
        }
    }

    /// Connection finished
    pub fn close(&mut self) {
        self.phase = ConnectionPhase::Closed;
    }

    /// Bound stream, if subscribed
    pub fn stream(&self) -> Option<&StreamKey> {
        self.stream.as_ref()
    }

    /// Check if the connection is subscribed
    pub fn is_subscribed(&self) -> bool {
        self.phase == ConnectionPhase::Subscribed
    }

    /// Get connection duration
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
