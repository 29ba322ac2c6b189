//! Capability metadata and the standard result/action envelopes.
//!
//! A [`Capability`] describes what a tool can do and when to use it; it is
//! constructed once per tool instance and never mutated. [`ToolResult`] and
//! [`ToolAction`] are the envelopes exchanged between the planner, the
//! executor, and the caller.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Value type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    /// Whether a JSON value matches this type after lenient coercion rules.
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

/// Specification of a single tool parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    /// Default injected when the parameter is absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Closed set of allowed values.
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<serde_json::Value>>,
    /// Inclusive lower bound for integer parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<i64>,
    /// Inclusive upper bound for integer parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<i64>,
}

impl ParamSpec {
    pub fn new(param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            param_type,
            description: description.into(),
            required: false,
            default: None,
            allowed: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn one_of(mut self, allowed: &[&str]) -> Self {
        self.allowed = Some(
            allowed
                .iter()
                .map(|v| serde_json::Value::String(v.to_string()))
                .collect(),
        );
        self
    }

    pub fn with_range(mut self, minimum: i64, maximum: i64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }
}

/// Describes what a tool can do and when to use it.
///
/// Immutable once constructed; owned by its tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    /// Unique tool name.
    pub name: String,
    pub description: String,
    /// Parameter specifications keyed by parameter name (ordered).
    pub parameters: BTreeMap<String, ParamSpec>,
    /// Free-text phrases describing situations where the tool applies.
    pub use_cases: Vec<String>,
    /// Labels of the data sources the tool reads or writes.
    pub data_sources: Vec<String>,
    /// Context keys that must be present before the tool is usable.
    pub prerequisites: Vec<String>,
    /// Tokens whose presence in an intent raises confidence.
    pub confidence_keywords: Vec<String>,
}

impl Capability {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: BTreeMap::new(),
            use_cases: Vec::new(),
            data_sources: Vec::new(),
            prerequisites: Vec::new(),
            confidence_keywords: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.parameters.insert(name.into(), spec);
        self
    }

    pub fn with_use_cases(mut self, use_cases: &[&str]) -> Self {
        self.use_cases = use_cases.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_data_sources(mut self, sources: &[&str]) -> Self {
        self.data_sources = sources.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_prerequisites(mut self, prerequisites: &[&str]) -> Self {
        self.prerequisites = prerequisites.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_confidence_keywords(mut self, keywords: &[&str]) -> Self {
        self.confidence_keywords = keywords.iter().map(|s| s.to_string()).collect();
        self
    }

    /// JSON-schema-shaped view of the parameters, for LLM planning prompts.
    pub fn parameters_schema(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .parameters
            .iter()
            .map(|(name, spec)| {
                (
                    name.clone(),
                    serde_json::to_value(spec).unwrap_or(serde_json::Value::Null),
                )
            })
            .collect();

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Outcome status of a tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Error,
    Partial,
    Skipped,
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Partial => "partial",
            Self::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

/// Standard result envelope produced by every tool execution attempt.
///
/// Immutable after creation; one per attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Wall-clock execution time in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    pub result_id: Uuid,
}

impl ToolResult {
    pub fn success(tool_name: impl Into<String>, data: serde_json::Value) -> Self {
        Self::with_status(tool_name, ResultStatus::Success, Some(data), None)
    }

    pub fn partial(tool_name: impl Into<String>, data: serde_json::Value) -> Self {
        Self::with_status(tool_name, ResultStatus::Partial, Some(data), None)
    }

    pub fn error(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self::with_status(tool_name, ResultStatus::Error, None, Some(error.into()))
    }

    fn with_status(
        tool_name: impl Into<String>,
        status: ResultStatus,
        data: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            status,
            data,
            error,
            metadata: None,
            execution_time: None,
            result_id: Uuid::new_v4(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_execution_time(mut self, elapsed: std::time::Duration) -> Self {
        self.execution_time = Some(elapsed.as_secs_f64());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }

    /// Whether the result carries a non-empty data payload.
    pub fn has_data(&self) -> bool {
        match &self.data {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::Object(map)) => !map.is_empty(),
            Some(serde_json::Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        }
    }
}

/// A planned request to run a tool.
///
/// Created by the planning step each iteration; consumed once by the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolAction {
    pub tool_name: String,
    pub parameters: serde_json::Value,
    /// Execution priority; lower runs first.
    pub priority: i32,
    /// Result IDs this action depends on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<Uuid>>,
    pub action_id: Uuid,
}

impl ToolAction {
    pub fn new(tool_name: impl Into<String>, parameters: serde_json::Value, priority: i32) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters,
            priority,
            depends_on: None,
            action_id: Uuid::new_v4(),
        }
    }

    pub fn with_dependencies(mut self, depends_on: Vec<Uuid>) -> Self {
        self.depends_on = Some(depends_on);
        self
    }
}

/// Timestamp helper used by envelopes and context records.
pub fn now_iso() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_builder_collects_fields() {
        let cap = Capability::new("demo", "A demo tool")
            .with_parameter(
                "query",
                ParamSpec::new(ParamType::String, "Search query").required(),
            )
            .with_parameter(
                "limit",
                ParamSpec::new(ParamType::Integer, "Max results")
                    .with_default(serde_json::json!(10))
                    .with_range(1, 50),
            )
            .with_use_cases(&["search things"])
            .with_confidence_keywords(&["search", "find"]);

        assert_eq!(cap.name, "demo");
        assert_eq!(cap.parameters.len(), 2);
        assert!(cap.parameters["query"].required);
        assert_eq!(cap.parameters["limit"].minimum, Some(1));
    }

    #[test]
    fn parameters_schema_lists_required_keys() {
        let cap = Capability::new("demo", "demo").with_parameter(
            "query",
            ParamSpec::new(ParamType::String, "Search query").required(),
        );

        let schema = cap.parameters_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], serde_json::json!(["query"]));
        assert_eq!(schema["properties"]["query"]["type"], "string");
    }

    #[test]
    fn result_ids_are_unique() {
        let a = ToolResult::success("t", serde_json::json!({"x": 1}));
        let b = ToolResult::success("t", serde_json::json!({"x": 1}));
        assert_ne!(a.result_id, b.result_id);
    }

    #[test]
    fn has_data_ignores_empty_payloads() {
        let empty = ToolResult::success("t", serde_json::json!({}));
        assert!(!empty.has_data());

        let full = ToolResult::success("t", serde_json::json!({"rows": [1]}));
        assert!(full.has_data());

        let err = ToolResult::error("t", "boom");
        assert!(!err.has_data());
        assert_eq!(err.status, ResultStatus::Error);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_value(ResultStatus::Partial).unwrap();
        assert_eq!(json, serde_json::json!("partial"));
        assert_eq!(ResultStatus::Success.to_string(), "success");
    }

    #[test]
    fn param_type_matching() {
        assert!(ParamType::Integer.matches(&serde_json::json!(3)));
        assert!(!ParamType::Integer.matches(&serde_json::json!(3.5)));
        assert!(ParamType::Number.matches(&serde_json::json!(3.5)));
        assert!(ParamType::Array.matches(&serde_json::json!([])));
    }
}
