//! Broadcast frame type

use serde::Serialize;
use tokio_tungstenite::tungstenite::Utf8Bytes;

/// A serialized update ready to be written to any number of sockets
///
/// Cheap to clone: the text is reference counted.
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastFrame {
    /// Registry sequence number of the update this frame carries
    pub seq: u64,
    /// JSON text sent verbatim to clients
    pub text: Utf8Bytes,
}

impl BroadcastFrame {
    /// Serialize a value into a frame
    pub fn encode<T: Serialize + ?Sized>(seq: u64, value: &T) -> serde_json::Result<Self> {
        let text = serde_json::to_string(value)?;
        Ok(Self {
            seq,
            text: text.into(),
        })
    }

    /// Frame text as a string slice
    pub fn as_str(&self) -> &str {
        self.text.as_str()
    }
}
