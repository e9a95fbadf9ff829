//! Hand-off from producer threads to the network thread
//!
//! A push does two things: it replaces the cached value in the registry right
//! away, on the caller's thread, and it queues an [`Update`] for the network
//! loop. The queue is unbounded, so the caller never waits for the loop or for
//! any socket. When the loop is not running the queue is closed and the
//! update is only cached.
//!
//! ```text
//!   producer thread                 network thread
//!   ───────────────                 ──────────────
//!   push_sync(key, payload)
//!     ├─ registry.set_cache()
//!     └─ tx.send(Update) ─────────► run_dispatcher()
//!                                     ├─ BroadcastFrame::encode()
//!                                     └─ broadcaster.broadcast()
//! ```

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::broadcast::{BroadcastFrame, Broadcaster};
use crate::registry::{RegistryError, StreamKey, StreamRegistry};

/// An accepted update waiting to be delivered
#[derive(Debug, Clone)]
pub struct Update {
    pub key: StreamKey,
    pub seq: u64,
    pub payload: Arc<Value>,
}

/// Receiving end of the update queue, owned by the dispatcher
pub type UpdateReceiver = mpsc::UnboundedReceiver<Update>;

/// Producer-side handle of the bridge
///
/// Cloneable and usable from any thread.
#[derive(Clone)]
pub struct UpdateSender {
    registry: Arc<StreamRegistry>,
    tx: mpsc::UnboundedSender<Update>,
}

impl UpdateSender {
    /// Create a bridge over `registry`, returning the receiver for the dispatcher
    pub fn new(registry: Arc<StreamRegistry>) -> (Self, UpdateReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { registry, tx }, rx)
    }

    /// The registry this bridge writes to
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Cache a payload and schedule its delivery
    ///
    /// The cache reflects `payload` when this returns. Pushing to an
    /// unregistered key is logged and ignored; pushing while the network loop
    /// is down only updates the cache.
    pub fn push_sync(&self, key: &StreamKey, payload: Value) {
        let entry = match self.registry.set_cache(key, payload) {
            Ok(entry) => entry,
            Err(RegistryError::NotRegistered(_)) => {
                tracing::error!(stream = %key, "Push to unregistered stream dropped");
                return;
            }
        };

        let update = Update {
            key: key.clone(),
            seq: entry.seq,
            payload: entry.payload,
        };

        if self.tx.send(update).is_err() {
            tracing::debug!(stream = %key, "Network loop not running, update cached only");
        }
    }

    /// Whether the network loop is still receiving updates
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Deliver queued updates until every sender is dropped
///
/// Runs on the network thread. Each update is serialized once and shared by
/// all subscriber queues.
pub async fn run_dispatcher(mut rx: UpdateReceiver, broadcaster: Arc<Broadcaster>) {
    while let Some(update) = rx.recv().await {
        let frame = match BroadcastFrame::encode(update.seq, update.payload.as_ref()) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(stream = %update.key, error = %e, "Failed to encode update");
                continue;
            }
        };

        let delivered = broadcaster.broadcast(&update.key, &frame);
        tracing::trace!(
            stream = %update.key,
            seq = update.seq,
            delivered = delivered,
            "Update dispatched"
        );
    }

    tracing::debug!("Update dispatcher stopped");
}
