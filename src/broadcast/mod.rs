//! Fan-out of stream updates to subscribed connections
//!
//! The [`Broadcaster`] owns the per-key subscriber lists. It lives on the
//! network thread: producers never touch it directly, their updates arrive
//! through the bridge dispatcher.
//!
//! Each subscriber is an outbound queue drained by its own connection task,
//! so a slow socket never holds up delivery to anyone else. Frames are
//! serialized once and shared: `Utf8Bytes` is reference counted, so every
//! queue holds the same allocation.

pub mod fanout;
pub mod frame;

pub use fanout::{Broadcaster, SubscriberQueue};
pub use frame::BroadcastFrame;
