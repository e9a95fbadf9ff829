//! chartcast: real-time chart data streaming over WebSocket
//!
//! Producer code running on any thread pushes timestamped JSON payloads for a
//! logical stream key. A dedicated network thread delivers every accepted
//! update to the WebSocket clients subscribed to that key, and keeps the most
//! recent value per key so late joiners start from the current state.
//!
//! # Architecture
//!
//! ```text
//!   producer threads                         network thread (tokio current-thread)
//!  ┌──────────────────┐                    ┌──────────────────────────────────────┐
//!  │ DataStream       │                    │ Listener ──► Connection (per client) │
//!  │  .update(value)  │                    │                  │ subscribe         │
//!  │    │ validate    │                    │                  ▼                   │
//!  │    ▼             │   Update (mpsc)    │ dispatcher ──► Broadcaster           │
//!  │ UpdateSender ────┼───────────────────►│                  │ try_send          │
//!  │    │ set_cache   │                    │                  ▼                   │
//!  │    ▼             │                    │        per-connection queues ──► WS  │
//!  │ StreamRegistry ◄─┼──── catch-up ──────┤                                      │
//!  └──────────────────┘                    └──────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use chartcast::{ChartType, ServerConfig, ServerHandle};
//!
//! # fn main() -> chartcast::Result<()> {
//! let server = ServerHandle::start(ServerConfig::default().port(8765).route("/data"))?;
//! let line = server.stream(ChartType::Line, "demo");
//! line.fresh(42.0);
//! server.stop();
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod broadcast;
pub mod chart;
pub mod error;
pub mod registry;
pub mod server;
pub mod stream;

pub use chart::{ChartType, Payload, PayloadShape, ValidationError};
pub use error::{Error, Result};
pub use registry::{CachedValue, StreamKey, StreamRegistry};
pub use server::{Server, ServerConfig, ServerHandle};
pub use stream::DataStream;
