//! Entity extraction over request text.
//!
//! Pulls dates, user identifiers, and topic labels out of free text so the
//! selector and the planning fallback can anchor tool parameters without an
//! LLM round trip.

use std::sync::LazyLock;

use chrono::{Duration, NaiveDate, Utc};
use regex::Regex;

use crate::context::RequestContext;

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").expect("valid regex"));
static US_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2}/\d{1,2}/\d{4})\b").expect("valid regex"));
static DAY_TERM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(today|yesterday|tomorrow)\b").expect("valid regex"));
static WEEK_TERM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(last week|this week|next week)\b").expect("valid regex"));

static USER_ID_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\buser[_\s]*(?:id)?[:\s]+([A-Za-z0-9_-]+)\b").expect("valid regex")
});
static FOR_USER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bfor\s+user\s+([A-Za-z0-9_-]+)\b").expect("valid regex"));
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Za-z0-9_-]+)@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid regex")
});

/// Topic keyword groups; every matching label is appended to `data_types`.
const DATA_TYPE_GROUPS: &[(&str, &[&str])] = &[
    ("activity", &["activity", "activities", "actions", "behavior"]),
    ("preferences", &["preferences", "settings", "configuration"]),
    ("history", &["history", "historical", "past", "previous"]),
    ("summary", &["summary", "report", "overview", "digest"]),
    ("analysis", &["analysis", "insights", "trends", "patterns"]),
];

/// Extract entities from request text into context keys, resolving relative
/// dates against the process clock.
pub fn extract_entities(request: &str, context: &mut RequestContext) {
    extract_entities_at(request, Utc::now().date_naive(), context)
}

/// Clock-injected variant for deterministic tests.
pub fn extract_entities_at(request: &str, today: NaiveDate, context: &mut RequestContext) {
    // Date patterns are tried in a fixed precedence order; first match wins.
    let date_match = ISO_DATE
        .captures(request)
        .or_else(|| US_DATE.captures(request))
        .or_else(|| DAY_TERM.captures(request))
        .or_else(|| WEEK_TERM.captures(request));

    if let Some(caps) = date_match {
        let text = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        match resolve_date(text, today) {
            Some(date) => {
                context.insert("date", date.to_string());
                context.insert("original_date_text", text);
            }
            None => tracing::warn!(text, "failed to parse date entity"),
        }
    }

    let user_match = USER_ID_LABEL
        .captures(request)
        .or_else(|| FOR_USER.captures(request))
        .or_else(|| EMAIL.captures(request));
    if let Some(caps) = user_match
        && let Some(id) = caps.get(1)
    {
        context.insert("extracted_user_id", id.as_str());
    }

    let request_lower = request.to_lowercase();
    let data_types: Vec<serde_json::Value> = DATA_TYPE_GROUPS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| request_lower.contains(kw)))
        .map(|(label, _)| serde_json::Value::String(label.to_string()))
        .collect();
    if !data_types.is_empty() {
        context.insert("data_types", serde_json::Value::Array(data_types));
    }
}

/// Resolve a matched date string to a calendar date.
///
/// Relative terms resolve against `today`; anything else goes through a
/// permissive parse of the common absolute formats.
fn resolve_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    match text.to_lowercase().as_str() {
        "today" | "this week" => Some(today),
        "yesterday" => Some(today - Duration::days(1)),
        "tomorrow" => Some(today + Duration::days(1)),
        "last week" => Some(today - Duration::weeks(1)),
        "next week" => Some(today + Duration::weeks(1)),
        _ => parse_absolute_date(text),
    }
}

fn parse_absolute_date(text: &str) -> Option<NaiveDate> {
    const FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d %B %Y", "%B %d, %Y"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}
