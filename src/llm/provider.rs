//! Language-model backend contract.
//!
//! The orchestration loop treats the backend as an untrusted text producer:
//! it sends a system prompt plus a user prompt and gets free text back. All
//! structure expected from that text (JSON action arrays, YES/NO prefixes) is
//! enforced by the caller with deterministic fallbacks, never assumed here.

use async_trait::async_trait;

use crate::error::LlmError;

/// One completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            max_tokens: 4000,
            temperature: 0.1,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Backend producing free-text completions.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Identifier of the underlying model, for logging.
    fn model_name(&self) -> &str;

    /// Produce a completion for the request.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}
