//! Producer-side stream handle
//!
//! A [`DataStream`] ties a chart type and a keyword to a running server.
//! Every update is validated against the chart type before it reaches the
//! cache; rejected updates are logged and dropped.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use serde_json::Value;

use crate::bridge::UpdateSender;
use crate::chart::{validate, ChartType, Payload};
use crate::registry::StreamKey;

/// Handle for pushing updates to one stream
#[derive(Clone)]
pub struct DataStream {
    chart_type: ChartType,
    key: StreamKey,
    bridge: UpdateSender,
}

impl DataStream {
    /// Register the stream and create a handle for it
    pub(crate) fn new(chart_type: ChartType, key_word: &str, bridge: UpdateSender) -> Self {
        let key = StreamKey::for_chart(chart_type, key_word);
        bridge.registry().register(&key);
        Self {
            chart_type,
            key,
            bridge,
        }
    }

    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    pub fn chart_type(&self) -> ChartType {
        self.chart_type
    }

    /// Normalized keyword part of the key
    pub fn key_word(&self) -> &str {
        self.key.parts().1
    }

    /// Validate and push a payload
    ///
    /// Returns whether the payload was accepted.
    pub fn update(&self, payload: impl Into<Value>) -> bool {
        let payload = payload.into();
        if let Err(e) = validate(self.chart_type, &payload) {
            tracing::error!(
                stream = %self.key,
                error = %e,
                expected = self.chart_type.shape().expected_form(),
                "Invalid payload dropped"
            );
            return false;
        }

        self.bridge.push_sync(&self.key, payload);
        true
    }

    /// Push `value` wrapped in a payload stamped with the current time
    pub fn fresh(&self, value: impl Into<Value>) -> bool {
        self.update(Payload::fresh(value))
    }

    /// Most recent accepted payload
    pub fn cached(&self) -> Option<Arc<Value>> {
        self.bridge.registry().get_cache(&self.key)
    }

    /// Run `f` with this stream on a background thread
    ///
    /// A panic inside `f` is logged and does not propagate.
    pub fn execute<F>(&self, f: F) -> thread::JoinHandle<()>
    where
        F: FnOnce(DataStream) + Send + 'static,
    {
        let stream = self.clone();
        let key = self.key.clone();
        thread::spawn(move || {
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| f(stream))) {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(stream = %key, panic = %message, "Stream task panicked");
            }
        })
    }
}

impl std::fmt::Debug for DataStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStream")
            .field("chart_type", &self.chart_type)
            .field("key", &self.key)
            .finish()
    }
}
