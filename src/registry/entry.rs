//! Cached value type
//!
//! This module defines the per-stream value stored in the registry.

use std::sync::Arc;

use serde_json::Value;

/// Most recently accepted payload for a stream
///
/// Replaced as a whole on every write; readers hold their own `Arc` and never
/// see a partially written value.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue {
    /// Per-stream write counter, starting at 1
    pub seq: u64,
    /// The payload exactly as pushed
    pub payload: Arc<Value>,
}

impl CachedValue {
    pub(super) fn new(seq: u64, payload: Value) -> Self {
        Self {
            seq,
            payload: Arc::new(payload),
        }
    }
}
