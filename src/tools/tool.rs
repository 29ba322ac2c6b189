//! Tool trait and parameter validation.

use async_trait::async_trait;
use thiserror::Error;

use crate::context::RequestContext;
use crate::tools::capability::{Capability, ToolResult};
use crate::tools::scoring;

/// Error type for tool-level failures.
///
/// These stay local to the tool layer: the executor folds every variant into
/// an error-status [`ToolResult`] instead of letting it escape the iteration.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Tool not configured: {0}")]
    NotConfigured(String),
}

/// Trait implemented by every callable capability.
///
/// `execute` is the only operation allowed to perform external I/O, and it
/// must never panic: all failure paths are captured into a [`ToolResult`]
/// with status `error`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Capability metadata. Deterministic per instance.
    fn capability(&self) -> &Capability;

    /// Whether the tool is enabled. Disabled tools score 0.0 unconditionally.
    fn enabled(&self) -> bool {
        true
    }

    /// Validate and coerce raw parameters into a clean mapping.
    ///
    /// The default implementation checks required parameters, types, enum
    /// constraints, and integer ranges against the capability's parameter
    /// specs, and injects declared defaults for absent optional parameters.
    fn validate_parameters(&self, raw: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
        validate_against_capability(self.capability(), raw)
    }

    /// Execute with validated parameters, returning a result envelope.
    async fn execute(&self, params: serde_json::Value, ctx: &RequestContext) -> ToolResult;

    /// Confidence in `[0, 1]` that this tool applies to the intent.
    fn applicability(&self, intent: &str, context: &RequestContext) -> f64 {
        if !self.enabled() {
            return 0.0;
        }
        scoring::base_score(self.capability(), intent, context)
    }

    /// Set up connections or sessions. Returns false when the tool cannot
    /// come up; the registry then leaves it disabled.
    async fn initialize(&self) -> bool {
        true
    }

    /// Release any held resources. Must be safe to call more than once.
    async fn cleanup(&self) {}
}

/// Default parameter validation against a capability's parameter specs.
pub fn validate_against_capability(
    capability: &Capability,
    raw: &serde_json::Value,
) -> Result<serde_json::Value, ToolError> {
    let empty = serde_json::Map::new();
    let raw_map = match raw {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => &empty,
        _ => {
            return Err(ToolError::InvalidParameters(
                "parameters must be a JSON object".to_string(),
            ));
        }
    };

    let mut validated = serde_json::Map::new();

    for (name, spec) in &capability.parameters {
        let value = match raw_map.get(name) {
            Some(serde_json::Value::Null) | None => {
                if spec.required {
                    return Err(ToolError::InvalidParameters(format!(
                        "missing required parameter '{}'",
                        name
                    )));
                }
                if let Some(default) = &spec.default {
                    validated.insert(name.clone(), default.clone());
                }
                continue;
            }
            Some(value) => value.clone(),
        };

        let value = coerce(&value, spec.param_type);
        if !spec.param_type.matches(&value) {
            return Err(ToolError::InvalidParameters(format!(
                "parameter '{}' has wrong type (expected {:?})",
                name, spec.param_type
            )));
        }

        if let Some(allowed) = &spec.allowed
            && !allowed.contains(&value)
        {
            return Err(ToolError::InvalidParameters(format!(
                "parameter '{}' must be one of {:?}",
                name, allowed
            )));
        }

        if let Some(n) = value.as_i64() {
            if let Some(min) = spec.minimum
                && n < min
            {
                return Err(ToolError::InvalidParameters(format!(
                    "parameter '{}' below minimum {}",
                    name, min
                )));
            }
            if let Some(max) = spec.maximum
                && n > max
            {
                return Err(ToolError::InvalidParameters(format!(
                    "parameter '{}' above maximum {}",
                    name, max
                )));
            }
        }

        validated.insert(name.clone(), value);
    }

    // Pass through keys the capability does not declare; concrete tools
    // ignore what they do not understand.
    for (name, value) in raw_map {
        if !validated.contains_key(name) && !capability.parameters.contains_key(name) {
            validated.insert(name.clone(), value.clone());
        }
    }

    Ok(serde_json::Value::Object(validated))
}

/// Lenient coercion of common LLM mis-typings (numeric strings, stringified
/// booleans) toward the declared parameter type.
fn coerce(value: &serde_json::Value, target: crate::tools::ParamType) -> serde_json::Value {
    use crate::tools::ParamType;

    if let serde_json::Value::String(s) = value {
        match target {
            ParamType::Integer => {
                if let Ok(n) = s.trim().parse::<i64>() {
                    return serde_json::Value::from(n);
                }
            }
            ParamType::Number => {
                if let Ok(n) = s.trim().parse::<f64>()
                    && let Some(num) = serde_json::Number::from_f64(n)
                {
                    return serde_json::Value::Number(num);
                }
            }
            ParamType::Boolean => match s.trim().to_lowercase().as_str() {
                "true" => return serde_json::Value::Bool(true),
                "false" => return serde_json::Value::Bool(false),
                _ => {}
            },
            _ => {}
        }
    }
    value.clone()
}

/// Extract a required string parameter from a validated JSON object.
pub fn require_str<'a>(params: &'a serde_json::Value, name: &str) -> Result<&'a str, ToolError> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidParameters(format!("missing '{}' parameter", name)))
}

/// Extract an optional integer parameter with a fallback.
pub fn opt_usize(params: &serde_json::Value, name: &str, default: usize) -> usize {
    params
        .get(name)
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .unwrap_or(default)
}
