//! Stream registry implementation
//!
//! The registry records which stream keys producers have declared and keeps
//! the last value pushed to each of them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use super::entry::CachedValue;
use super::error::RegistryError;
use super::key::StreamKey;

#[derive(Default)]
struct Inner {
    keys: HashSet<StreamKey>,
    cache: HashMap<StreamKey, CachedValue>,
}

/// Registry of known streams and their last values
///
/// Thread-safe via a single `RwLock`: every key and cache mutation goes
/// through it, and lookups from connections only take the read side.
#[derive(Default)]
pub struct StreamRegistry {
    inner: RwLock<Inner>,
}

impl StreamRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stream key
    ///
    /// Registering an existing key is a no-op.
    pub fn register(&self, key: &StreamKey) {
        let inserted = self.inner.write().keys.insert(key.clone());

        if inserted {
            tracing::info!(stream = %key, "Stream registered");
        } else {
            tracing::debug!(stream = %key, "Stream already registered");
        }
    }

    /// Check whether a key has been registered
    pub fn is_registered(&self, key: &StreamKey) -> bool {
        self.inner.read().keys.contains(key)
    }

    /// Replace the cached value for a registered key
    ///
    /// Returns the stored entry, whose `seq` is one past the previous write.
    pub fn set_cache(&self, key: &StreamKey, payload: Value) -> Result<CachedValue, RegistryError> {
        let mut inner = self.inner.write();

        if !inner.keys.contains(key) {
            return Err(RegistryError::NotRegistered(key.clone()));
        }

        let seq = inner.cache.get(key).map_or(1, |prev| prev.seq + 1);
        let entry = CachedValue::new(seq, payload);
        inner.cache.insert(key.clone(), entry.clone());

        Ok(entry)
    }

    /// Get the last payload pushed for a key
    pub fn get_cache(&self, key: &StreamKey) -> Option<Arc<Value>> {
        self.cached_entry(key).map(|entry| entry.payload)
    }

    /// Get the last cache entry for a key, including its sequence number
    pub fn cached_entry(&self, key: &StreamKey) -> Option<CachedValue> {
        self.inner.read().cache.get(key).cloned()
    }

    /// Number of registered streams
    pub fn stream_count(&self) -> usize {
        self.inner.read().keys.len()
    }

    /// All registered keys, sorted
    pub fn keys(&self) -> Vec<StreamKey> {
        let mut keys: Vec<_> = self.inner.read().keys.iter().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_register_idempotent() {
        let registry = StreamRegistry::new();
        let key = StreamKey::new("line", "demo");

        assert!(!registry.is_registered(&key));
        registry.register(&key);
        registry.register(&key);

        assert!(registry.is_registered(&key));
        assert_eq!(registry.stream_count(), 1);
    }

    #[test]
    fn test_set_and_get_cache() {
        let registry = StreamRegistry::new();
        let key = StreamKey::new("line", "demo");
        registry.register(&key);

        assert!(registry.get_cache(&key).is_none());

        let payload = json!({"id": "1", "timestamp": "2024-01-01T00:00:00", "value": 42.0});
        let entry = registry.set_cache(&key, payload.clone()).unwrap();
        assert_eq!(entry.seq, 1);
        assert_eq!(*registry.get_cache(&key).unwrap(), payload);

        let second = json!({"id": "2", "timestamp": "2024-01-01T00:00:01", "value": 43.0});
        let entry = registry.set_cache(&key, second.clone()).unwrap();
        assert_eq!(entry.seq, 2);
        assert_eq!(*registry.get_cache(&key).unwrap(), second);
    }

    #[test]
    fn test_set_cache_unregistered() {
        let registry = StreamRegistry::new();
        let key = StreamKey::new("pie", "unknown");

        let result = registry.set_cache(&key, json!({"value": 1}));
        assert_eq!(result, Err(RegistryError::NotRegistered(key.clone())));
        assert!(registry.get_cache(&key).is_none());
        assert!(!registry.is_registered(&key));
    }

    #[test]
    fn test_reader_keeps_old_value() {
        let registry = StreamRegistry::new();
        let key = StreamKey::new("text", "log");
        registry.register(&key);

        registry.set_cache(&key, json!("first")).unwrap();
        let held = registry.get_cache(&key).unwrap();
        registry.set_cache(&key, json!("second")).unwrap();

        assert_eq!(*held, json!("first"));
        assert_eq!(*registry.get_cache(&key).unwrap(), json!("second"));
    }

    #[test]
    fn test_concurrent_writers() {
        let registry = Arc::new(StreamRegistry::new());
        let key = StreamKey::new("line", "concurrent");
        registry.register(&key);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                let key = key.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        registry.set_cache(&key, json!({"t": t, "i": i})).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let entry = registry.cached_entry(&key).unwrap();
        assert_eq!(entry.seq, 800);
        assert_eq!(entry.payload["i"], json!(99));
    }

    #[test]
    fn test_keys_sorted() {
        let registry = StreamRegistry::new();
        registry.register(&StreamKey::new("pie", "b"));
        registry.register(&StreamKey::new("line", "a"));

        let keys: Vec<_> = registry.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["line<:>a", "pie<:>b"]);
    }
}
