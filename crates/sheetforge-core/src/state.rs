//! Persisted sync state: per-stream bookmarks plus the currently-syncing
//! marker. The orchestrator mutates this map and pushes a snapshot through
//! the sink and the checkpoint store after each meaningful transition.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TapState {
    /// Stream being delivered right now; a resume hint for interrupted runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currently_syncing: Option<String>,

    /// Per-stream bookmark values. Worksheet streams store the
    /// activate-version token; the file-metadata stream stores the last
    /// modification timestamp.
    #[serde(default)]
    pub bookmarks: Map<String, Value>,
}

impl TapState {
    pub fn bookmark(&self, stream: &str) -> Option<&Value> {
        self.bookmarks.get(stream)
    }

    /// Bookmark as an integer token, defaulting to 0 when absent or
    /// non-numeric. Zero means "never loaded".
    pub fn integer_bookmark(&self, stream: &str) -> i64 {
        self.bookmarks
            .get(stream)
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    pub fn string_bookmark(&self, stream: &str) -> Option<&str> {
        self.bookmarks.get(stream).and_then(Value::as_str)
    }

    pub fn set_bookmark(&mut self, stream: &str, value: Value) {
        self.bookmarks.insert(stream.to_string(), value);
    }

    pub fn set_currently_syncing(&mut self, stream: Option<&str>) {
        self.currently_syncing = stream.map(str::to_string);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_bookmark_defaults_to_zero() {
        let state = TapState::default();
        assert_eq!(state.integer_bookmark("Sheet1"), 0);
    }

    #[test]
    fn integer_bookmark_ignores_non_numeric() {
        let mut state = TapState::default();
        state.set_bookmark("file_metadata", json!("2024-01-01T00:00:00Z"));
        assert_eq!(state.integer_bookmark("file_metadata"), 0);
        assert_eq!(
            state.string_bookmark("file_metadata"),
            Some("2024-01-01T00:00:00Z")
        );
    }

    #[test]
    fn currently_syncing_roundtrips() {
        let mut state = TapState::default();
        state.set_currently_syncing(Some("Sheet1"));
        let text = serde_json::to_string(&state).unwrap();
        let parsed: TapState = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.currently_syncing.as_deref(), Some("Sheet1"));

        state.set_currently_syncing(None);
        let text = serde_json::to_string(&state).unwrap();
        assert!(!text.contains("currently_syncing"));
    }
}
