//! Per-request context record.
//!
//! A flat key/value mapping built for each user request. Base fields, extracted
//! entities, and session snapshots all live side by side so prerequisite checks
//! and parameter fallbacks can treat them uniformly. Tool outputs are injected
//! under `tool_result_<name>` keys during an iteration.

use serde::{Deserialize, Serialize};

/// Context mapping passed to every component handling a request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestContext {
    values: serde_json::Map<String, serde_json::Value>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.values.remove(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Merge another mapping into this one; incoming keys win.
    pub fn merge(&mut self, extra: serde_json::Map<String, serde_json::Value>) {
        for (key, value) in extra {
            self.values.insert(key, value);
        }
    }

    /// The user's request text, when present.
    pub fn user_request(&self) -> &str {
        self.get_str("user_request").unwrap_or_default()
    }

    /// The session id this request belongs to.
    pub fn session_id(&self) -> &str {
        self.get_str("session_id").unwrap_or("default")
    }

    /// Tool names used recently in this session, from the session snapshot.
    pub fn recent_tool_usage(&self) -> Vec<&str> {
        self.get("recent_tool_usage")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }

    /// View of the underlying mapping.
    pub fn as_map(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.values
    }

    /// Whole context as a JSON value (for prompts and API responses).
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.values.clone())
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for RequestContext {
    fn from(values: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { values }
    }
}
