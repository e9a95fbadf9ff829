//! Stream key type

use std::fmt;
use std::sync::Arc;

use crate::chart::ChartType;

/// Unique identifier for a stream (chart type + keyword)
///
/// Formed as `<chart_type><:><key_word>`, where the keyword is trimmed and
/// lower-cased. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamKey(Arc<str>);

impl StreamKey {
    /// Separator between chart type and keyword
    pub const SEPARATOR: &'static str = "<:>";

    /// Create a stream key from a chart tag and a user keyword
    pub fn new(chart_type: &str, key_word: &str) -> Self {
        let key_word = key_word.trim().to_lowercase();
        Self(format!("{}{}{}", chart_type, Self::SEPARATOR, key_word).into())
    }

    /// Create a stream key for a known chart type
    pub fn for_chart(chart_type: ChartType, key_word: &str) -> Self {
        Self::new(chart_type.as_str(), key_word)
    }

    /// The full key string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the key back into chart tag and keyword
    pub fn parts(&self) -> (&str, &str) {
        self.0
            .split_once(Self::SEPARATOR)
            .unwrap_or((self.0.as_ref(), ""))
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
