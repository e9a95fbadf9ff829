//! Per-key subscriber lists and delivery

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::registry::{StreamKey, StreamRegistry};

use super::frame::BroadcastFrame;

/// Receiving end of a subscriber's outbound queue
pub type SubscriberQueue = mpsc::Receiver<BroadcastFrame>;

struct Subscriber {
    tx: mpsc::Sender<BroadcastFrame>,
    /// Highest sequence already queued; older frames are skipped
    last_seq: u64,
}

/// Delivers updates to the connections bound to each stream key
#[derive(Default)]
pub struct Broadcaster {
    /// stream key -> connection id -> subscriber
    subscribers: Mutex<HashMap<StreamKey, HashMap<u64, Subscriber>>>,
}

impl Broadcaster {
    /// Create a broadcaster with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to the fan-out list of `key`
    ///
    /// When `replay` is set and the registry holds a value for the key, that
    /// value is queued first so the client starts from the current state.
    /// Later broadcasts of the same or older updates are skipped for this
    /// subscriber, so it never sees a value go backwards.
    pub fn subscribe(
        &self,
        key: &StreamKey,
        conn_id: u64,
        tx: mpsc::Sender<BroadcastFrame>,
        registry: &StreamRegistry,
        replay: bool,
    ) {
        let mut subscribers = self.subscribers.lock();
        let mut last_seq = 0;

        if replay {
            if let Some(entry) = registry.cached_entry(key) {
                match BroadcastFrame::encode(entry.seq, entry.payload.as_ref()) {
                    Ok(frame) => {
                        // Fresh queue, cannot be full
                        let _ = tx.try_send(frame);
                        last_seq = entry.seq;
                    }
                    Err(e) => {
                        tracing::error!(stream = %key, error = %e, "Failed to encode cached value");
                    }
                }
            }
        }

        let list = subscribers.entry(key.clone()).or_default();
        list.insert(conn_id, Subscriber { tx, last_seq });

        tracing::info!(
            stream = %key,
            conn_id = conn_id,
            subscribers = list.len(),
            replayed = last_seq > 0,
            "Subscriber added"
        );
    }

    /// Remove a connection from the fan-out list of `key`
    ///
    /// Returns `false` if it was not subscribed (already dropped by a failed
    /// delivery, for instance).
    pub fn unsubscribe(&self, key: &StreamKey, conn_id: u64) -> bool {
        let mut subscribers = self.subscribers.lock();

        let Some(list) = subscribers.get_mut(key) else {
            return false;
        };
        let removed = list.remove(&conn_id).is_some();
        let remaining = list.len();

        if remaining == 0 {
            subscribers.remove(key);
        }

        if removed {
            tracing::debug!(
                stream = %key,
                conn_id = conn_id,
                subscribers = remaining,
                "Subscriber removed"
            );
        }

        removed
    }

    /// Queue a frame for every connection subscribed to `key`
    ///
    /// Never waits on a socket. A subscriber whose queue is full or closed is
    /// removed; dropping its sender ends the connection's writer, which then
    /// closes the socket. Returns the number of connections the frame was
    /// queued for.
    pub fn broadcast(&self, key: &StreamKey, frame: &BroadcastFrame) -> usize {
        let mut subscribers = self.subscribers.lock();

        let Some(list) = subscribers.get_mut(key) else {
            tracing::debug!(stream = %key, "Update has no subscribers");
            return 0;
        };

        let mut delivered = 0;
        list.retain(|conn_id, sub| {
            if frame.seq <= sub.last_seq {
                return true;
            }

            match sub.tx.try_send(frame.clone()) {
                Ok(()) => {
                    sub.last_seq = frame.seq;
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        stream = %key,
                        conn_id = *conn_id,
                        "Subscriber queue full, dropping connection"
                    );
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(stream = %key, conn_id = *conn_id, "Subscriber gone");
                    false
                }
            }
        });

        if list.is_empty() {
            subscribers.remove(key);
        }

        delivered
    }

    /// Number of connections subscribed to `key`
    pub fn subscriber_count(&self, key: &StreamKey) -> usize {
        self.subscribers.lock().get(key).map_or(0, HashMap::len)
    }

    /// Number of subscribed connections across all keys
    pub fn total_subscribers(&self) -> usize {
        self.subscribers.lock().values().map(HashMap::len).sum()
    }
}
