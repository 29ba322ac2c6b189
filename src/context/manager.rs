//! Builds per-request contexts and folds tool results back into session state.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::context::entities::extract_entities;
use crate::context::request::RequestContext;
use crate::context::session::{HistoryEntry, ResultDigest, SessionState};
use crate::tools::{ToolResult, now_iso};

/// Manages conversation context and per-session state across requests.
pub struct ContextManager {
    sessions: RwLock<HashMap<String, SessionState>>,
    max_history: usize,
}

impl ContextManager {
    pub fn new(max_history: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_history,
        }
    }

    /// Build the context record for one request.
    ///
    /// Base fields first, then extracted entities, then read-only session
    /// snapshots, then caller-supplied extras — extras merge last so they win
    /// over extracted values.
    pub async fn build_context(
        &self,
        user_request: &str,
        user_id: Option<&str>,
        session_id: Option<&str>,
        extra: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> RequestContext {
        let mut context = RequestContext::new();
        context.insert("user_request", user_request);
        context.insert("timestamp", now_iso());
        context.insert("session_id", session_id.unwrap_or("default"));
        if let Some(id) = user_id {
            context.insert("user_id", id);
        }

        extract_entities(user_request, &mut context);

        if let Some(sid) = session_id {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(sid) {
                context.insert("conversation_history", session.history_snapshot());
                context.insert(
                    "recent_tool_usage",
                    serde_json::json!(session.recent_tools),
                );
                context.insert("user_preferences", session.preferences_snapshot());
            }
        }

        if let Some(extra) = extra {
            context.merge(extra);
        }

        tracing::debug!(keys = context.len(), "built request context");
        context
    }

    /// Fold a batch of tool results into the session for this context.
    ///
    /// Creates the session lazily on first use. Appends one history entry,
    /// updates the recent-tools list, and bumps preference counters.
    pub async fn update_context(&self, context: &RequestContext, results: &[ToolResult]) {
        let session_id = context.session_id().to_string();

        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(session_id).or_default();

        let entry = HistoryEntry {
            timestamp: context
                .get_str("timestamp")
                .map(|s| s.to_string())
                .unwrap_or_else(now_iso),
            user_request: context.user_request().to_string(),
            tool_results: results
                .iter()
                .map(|r| ResultDigest {
                    tool_name: r.tool_name.clone(),
                    status: r.status.to_string(),
                    has_data: r.data.is_some(),
                })
                .collect(),
        };
        session.push_history(entry, self.max_history);

        session.note_tools(results.iter().map(|r| r.tool_name.as_str()));

        let data_types: Vec<String> = context
            .get("data_types")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        session.note_preferences(&data_types, results);
    }

    /// Snapshot of a session's state, if it exists.
    pub async fn session(&self, session_id: &str) -> Option<SessionState> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Drop a session entirely.
    pub async fn clear_session(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }

    /// Human-readable summary of a session's conversation so far.
    pub async fn conversation_summary(&self, session_id: &str) -> String {
        let sessions = self.sessions.read().await;
        let Some(session) = sessions.get(session_id) else {
            return "No conversation history found.".to_string();
        };
        if session.history.is_empty() {
            return "No conversation history available.".to_string();
        }

        let recent_tools = session
            .recent_tools
            .iter()
            .rev()
            .take(5)
            .rev()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");

        let mut lines = vec![
            format!("Conversation started: {}", session.created_at.to_rfc3339()),
            format!("Total interactions: {}", session.history.len()),
            format!("Recent tools used: {}", recent_tools),
        ];

        let recent: Vec<&HistoryEntry> = session.history.iter().rev().take(3).collect();
        if !recent.is_empty() {
            lines.push("Recent requests:".to_string());
            for (i, entry) in recent.iter().rev().enumerate() {
                lines.push(format!("  {}. {}", i + 1, entry.user_request));
            }
        }

        lines.join("\n")
    }
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new(50)
    }
}
