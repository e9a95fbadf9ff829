//! WebSocket server
//!
//! ```text
//!   Listener ── accept ──► Connection
//!                            ├─ upgrade, check route
//!                            ├─ read {"chart_type","key_word"}
//!                            ├─ registered? ── no ──► failure frame, close 1008
//!                            └─ yes ──► success frame, subscribe, forward frames
//! ```

pub mod config;
pub mod connection;
pub mod handle;
pub mod listener;
pub mod protocol;
pub mod state;

pub use config::ServerConfig;
pub use handle::{Server, ServerHandle};
