//! Per-session accumulator state.
//!
//! Lives for the process lifetime of a session id; no external persistence.
//! History and recent-tool lists are bounded — the caps hold after any number
//! of updates.

use std::collections::BTreeMap;
use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tools::ToolResult;

/// How many distinct recent tool names are retained.
pub const RECENT_TOOLS_CAP: usize = 10;

/// Digest of one tool result stored in session history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultDigest {
    pub tool_name: String,
    pub status: String,
    pub has_data: bool,
}

/// One history entry per processed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub user_request: String,
    pub tool_results: Vec<ResultDigest>,
}

/// Frequency counters derived from session activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    /// `requested_<data_type>` counters.
    #[serde(flatten)]
    pub counters: BTreeMap<String, u64>,
    /// Counters keyed by the sorted ` + `-joined names of tools that
    /// succeeded together in one batch.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tool_combinations: BTreeMap<String, u64>,
}

/// Accumulated state for one session id.
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub history: VecDeque<HistoryEntry>,
    pub recent_tools: Vec<String>,
    pub preferences: Preferences,
    pub created_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            history: VecDeque::new(),
            recent_tools: Vec::new(),
            preferences: Preferences::default(),
            created_at: Utc::now(),
        }
    }

    /// Append a history entry, dropping the oldest past `max_history`.
    pub fn push_history(&mut self, entry: HistoryEntry, max_history: usize) {
        self.history.push_back(entry);
        while self.history.len() > max_history {
            self.history.pop_front();
        }
    }

    /// Record tool names as recently used: deduplicated, newest retained,
    /// bounded to [`RECENT_TOOLS_CAP`].
    pub fn note_tools<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            if !self.recent_tools.iter().any(|t| t == name) {
                self.recent_tools.push(name.to_string());
            }
        }
        if self.recent_tools.len() > RECENT_TOOLS_CAP {
            let drop = self.recent_tools.len() - RECENT_TOOLS_CAP;
            self.recent_tools.drain(..drop);
        }
    }

    /// Update preference counters from the request's data types and the
    /// batch's successful tool combination.
    pub fn note_preferences(&mut self, data_types: &[String], results: &[ToolResult]) {
        for data_type in data_types {
            let key = format!("requested_{}", data_type);
            *self.preferences.counters.entry(key).or_insert(0) += 1;
        }

        let mut successful: Vec<&str> = results
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.tool_name.as_str())
            .collect();
        successful.sort_unstable();
        successful.dedup();

        if successful.len() > 1 {
            let combo = successful.join(" + ");
            *self.preferences.tool_combinations.entry(combo).or_insert(0) += 1;
        }
    }

    /// Read-only history snapshot as JSON, for context building.
    pub fn history_snapshot(&self) -> serde_json::Value {
        serde_json::to_value(&self.history).unwrap_or(serde_json::Value::Array(vec![]))
    }

    /// Read-only preferences snapshot as JSON.
    pub fn preferences_snapshot(&self) -> serde_json::Value {
        serde_json::to_value(&self.preferences).unwrap_or_else(|_| serde_json::json!({}))
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(request: &str) -> HistoryEntry {
        HistoryEntry {
            timestamp: "2026-08-07T00:00:00Z".to_string(),
            user_request: request.to_string(),
            tool_results: vec![],
        }
    }

    #[test]
    fn history_never_exceeds_cap() {
        let mut session = SessionState::new();
        for i in 0..120 {
            session.push_history(entry(&format!("req {}", i)), 50);
        }
        assert_eq!(session.history.len(), 50);
        // Newest entries are retained.
        assert_eq!(session.history.back().unwrap().user_request, "req 119");
        assert_eq!(session.history.front().unwrap().user_request, "req 70");
    }

    #[test]
    fn recent_tools_bounded_and_unique() {
        let mut session = SessionState::new();
        for i in 0..15 {
            let name = format!("tool_{}", i);
            session.note_tools([name.as_str()]);
            // Repeats never create duplicates.
            session.note_tools([name.as_str()]);
        }
        assert_eq!(session.recent_tools.len(), RECENT_TOOLS_CAP);
        let unique: std::collections::HashSet<&String> = session.recent_tools.iter().collect();
        assert_eq!(unique.len(), RECENT_TOOLS_CAP);
        assert_eq!(session.recent_tools.last().unwrap(), "tool_14");
    }

    #[test]
    fn preference_counters_accumulate() {
        let mut session = SessionState::new();
        session.note_preferences(&["activity".to_string()], &[]);
        session.note_preferences(&["activity".to_string(), "summary".to_string()], &[]);

        assert_eq!(session.preferences.counters["requested_activity"], 2);
        assert_eq!(session.preferences.counters["requested_summary"], 1);
    }

    #[test]
    fn tool_combinations_require_two_successes() {
        let mut session = SessionState::new();

        let one = vec![ToolResult::success("a", serde_json::json!({"x": 1}))];
        session.note_preferences(&[], &one);
        assert!(session.preferences.tool_combinations.is_empty());

        let two = vec![
            ToolResult::success("b", serde_json::json!({"x": 1})),
            ToolResult::error("c", "nope"),
            ToolResult::success("a", serde_json::json!({"x": 2})),
        ];
        session.note_preferences(&[], &two);
        assert_eq!(session.preferences.tool_combinations["a + b"], 1);
    }
}
