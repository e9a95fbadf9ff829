//! Registry error types

use super::key::StreamKey;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Cache write for a key that was never registered
    #[error("stream not registered: {0}")]
    NotRegistered(StreamKey),
}
