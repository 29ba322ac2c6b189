//! Error types for all layers.

use thiserror::Error;

/// Configuration errors raised while resolving settings from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from the language-model backend.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed ({provider}): {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("LLM authentication failed ({provider})")]
    AuthFailed { provider: String },

    #[error("LLM rate limited ({provider})")]
    RateLimited { provider: String },

    #[error("LLM returned an empty response ({provider})")]
    EmptyResponse { provider: String },

    #[error("LLM response could not be decoded ({provider}): {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Tool(#[from] crate::tools::ToolError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Server error: {0}")]
    Server(String),
}
