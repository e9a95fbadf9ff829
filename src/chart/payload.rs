//! Payload envelope

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single update for a stream: identifier, timestamp and chart-specific value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub id: String,
    pub timestamp: String,
    pub value: Value,
}

impl Payload {
    /// Create a payload from explicit parts
    pub fn new(id: impl Into<String>, timestamp: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            timestamp: timestamp.into(),
            value: value.into(),
        }
    }

    /// Create a payload stamped with the current local time
    pub fn fresh(value: impl Into<Value>) -> Self {
        Self::stamped(Local::now(), value)
    }

    fn stamped(now: DateTime<Local>, value: impl Into<Value>) -> Self {
        Self {
            id: now.format("%Y%m%d%H%M%S%6f").to_string(),
            timestamp: now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            value: value.into(),
        }
    }

    /// Convert to the JSON object pushed to clients
    pub fn into_value(self) -> Value {
        serde_json::json!({
            "id": self.id,
            "timestamp": self.timestamp,
            "value": self.value,
        })
    }
}

impl From<Payload> for Value {
    fn from(payload: Payload) -> Self {
        payload.into_value()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_stamped_format() {
        let now = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let payload = Payload::stamped(now, 1.5);

        assert_eq!(payload.id, "20240102030405000000");
        assert_eq!(payload.timestamp, "2024-01-02T03:04:05.000000");
        assert_eq!(payload.value, json!(1.5));
    }

    #[test]
    fn test_into_value() {
        let payload = Payload::new("1", "2024-01-01T00:00:00", 42.0);
        assert_eq!(
            payload.into_value(),
            json!({"id": "1", "timestamp": "2024-01-01T00:00:00", "value": 42.0})
        );
    }

    #[test]
    fn test_fresh_is_valid_envelope() {
        let value: Value = Payload::fresh("hello").into();
        assert!(crate::chart::is_valid_payload("text", &value));
    }
}
