//! Stream registry and last-value cache
//!
//! The registry is the only state shared between producer threads and the
//! network thread. It holds the set of known stream keys and the most recent
//! payload for each of them.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<StreamRegistry>
//!                  ┌──────────────────────────┐
//!                  │ RwLock<Inner {           │
//!                  │   keys:  HashSet<Key>,   │
//!                  │   cache: HashMap<Key,    │
//!                  │     CachedValue {        │
//!                  │       seq,               │
//!                  │       payload: Arc<Value>│
//!                  │     }>                   │
//!                  │ }>                       │
//!                  └────────────┬─────────────┘
//!                               │
//!         ┌─────────────────────┼──────────────────────┐
//!         │                     │                      │
//!         ▼                     ▼                      ▼
//!   [Producer]            [Connection]            [Producer]
//!   set_cache()           is_registered()         get_cache()
//!                         cached_entry()
//! ```
//!
//! Keys are never removed. A restarted server gets a new, empty registry.

pub mod entry;
pub mod error;
pub mod key;
pub mod store;

pub use entry::CachedValue;
pub use error::RegistryError;
pub use key::StreamKey;
pub use store::StreamRegistry;
