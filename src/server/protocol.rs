//! Wire messages of the subscription protocol
//!
//! ```text
//!   client                                   server
//!   ──────                                   ──────
//!   GET {route} (upgrade) ─────────────────►
//!   {"chart_type","key_word"} ─────────────►
//!                          ◄─────────────── {"status":"success",...}
//!                          ◄─────────────── payload, payload, ...
//! ```
//!
//! Any failure gets `{"status":"failure",...}` followed by close code 1008.

use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use crate::registry::StreamKey;

/// Sent after a successful subscription
pub const SUBSCRIPTION_OK: &str = "Subscription successful.";

/// Sent when the subscription request is malformed or names an unknown stream
pub const INVALID_SUBSCRIPTION: &str = "Invalid chart type or keyword.";

/// Sent when the request path does not match the configured route
pub const INVALID_PATH: &str = "Connection attempt on invalid path.";

/// Close reason used when the server stops
pub const SHUTDOWN_REASON: &str = "Server shutting down";

/// Close reason used when a subscriber falls too far behind
pub const LAGGED_REASON: &str = "Subscriber too slow";

/// First and only message a client sends
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscribeRequest {
    pub chart_type: String,
    pub key_word: String,
}

impl SubscribeRequest {
    /// Parse a subscription message
    ///
    /// Malformed JSON, anything other than an object, missing fields and
    /// non-string fields all yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        // Derived struct deserialization also takes the sequence form
        let value: serde_json::Value = serde_json::from_str(text).ok()?;
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// Stream key the request refers to
    pub fn stream_key(&self) -> StreamKey {
        StreamKey::new(&self.chart_type, &self.key_word)
    }
}

/// Outcome carried by a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failure,
}

/// Status frame sent in reply to the subscription request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub status: Status,
    pub message: String,
}

impl StatusMessage {
    pub fn success() -> Self {
        Self {
            status: Status::Success,
            message: SUBSCRIPTION_OK.to_string(),
        }
    }

    pub fn failure(message: &str) -> Self {
        Self {
            status: Status::Failure,
            message: message.to_string(),
        }
    }

    /// Encode as a WebSocket text frame
    pub fn to_message(&self) -> Message {
        // Two string fields, serialization cannot fail
        let text = serde_json::to_string(self).unwrap_or_default();
        Message::Text(text.into())
    }
}

/// Close frame for a rejected connection (policy violation, 1008)
pub fn policy_violation(reason: &'static str) -> CloseFrame {
    CloseFrame {
        code: CloseCode::Policy,
        reason: reason.into(),
    }
}

/// Close frame sent to subscribers when the server stops
pub fn shutdown_close() -> CloseFrame {
    CloseFrame {
        code: CloseCode::Normal,
        reason: SHUTDOWN_REASON.into(),
    }
}

/// Close frame sent to a subscriber dropped for falling behind
pub fn lagged_close() -> CloseFrame {
    CloseFrame {
        code: CloseCode::Again,
        reason: LAGGED_REASON.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subscribe() {
        let req = SubscribeRequest::parse(r#"{"chart_type":"line","key_word":" Demo "}"#).unwrap();
        assert_eq!(req.chart_type, "line");
        assert_eq!(req.stream_key(), StreamKey::new("line", "demo"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(SubscribeRequest::parse("not json").is_none());
        assert!(SubscribeRequest::parse(r#"{"chart_type":"line"}"#).is_none());
        assert!(SubscribeRequest::parse(r#"{"key_word":"demo"}"#).is_none());
        assert!(SubscribeRequest::parse(r#"{"chart_type":1,"key_word":"demo"}"#).is_none());
        assert!(SubscribeRequest::parse(r#"["line","demo"]"#).is_none());
    }

    #[test]
    fn test_status_wire_format() {
        let Message::Text(text) = StatusMessage::success().to_message() else {
            panic!("expected text frame");
        };
        assert_eq!(
            text.as_str(),
            r#"{"status":"success","message":"Subscription successful."}"#
        );

        let Message::Text(text) = StatusMessage::failure(INVALID_SUBSCRIPTION).to_message() else {
            panic!("expected text frame");
        };
        assert_eq!(
            text.as_str(),
            r#"{"status":"failure","message":"Invalid chart type or keyword."}"#
        );
    }

    #[test]
    fn test_close_codes() {
        assert_eq!(u16::from(policy_violation(INVALID_PATH).code), 1008);
        assert_eq!(u16::from(shutdown_close().code), 1000);
        assert_eq!(u16::from(lagged_close().code), 1013);
    }
}
