//! OpenAI-compatible Chat Completions backend.
//!
//! Works against any `/v1/chat/completions` endpoint (OpenAI, vLLM, LiteLLM,
//! local proxies). Usage parsing is defensive: malformed bodies become
//! [`LlmError`]s, never panics.

use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, LlmBackend};
use crate::llm::retry::{is_retryable_status, retry_backoff_delay};

const PROVIDER: &str = "openai_chat";
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Chat-completions backend over HTTP.
pub struct OpenAiChatBackend {
    client: Client,
    config: LlmConfig,
    max_retries: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponseBody {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl OpenAiChatBackend {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            config,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    fn api_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    async fn send(&self, body: &ChatRequestBody<'_>) -> Result<ChatResponseBody, LlmError> {
        let url = self.api_url();

        for attempt in 0..=self.max_retries {
            tracing::debug!(url = %url, attempt = attempt + 1, "sending chat completion request");

            let response = self
                .client
                .post(&url)
                .header(
                    "Authorization",
                    format!("Bearer {}", self.config.api_key.expose_secret()),
                )
                .json(body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    if attempt < self.max_retries {
                        let delay = retry_backoff_delay(attempt);
                        tracing::warn!(error = %e, ?delay, "chat request error, retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(LlmError::RequestFailed {
                        provider: PROVIDER.to_string(),
                        reason: e.to_string(),
                    });
                }
            };

            let status = response.status();
            if !status.is_success() {
                let code = status.as_u16();
                if code == 401 {
                    return Err(LlmError::AuthFailed {
                        provider: PROVIDER.to_string(),
                    });
                }
                if is_retryable_status(code) && attempt < self.max_retries {
                    let delay = retry_backoff_delay(attempt);
                    tracing::warn!(status = code, ?delay, "chat endpoint returned error, retrying");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                if code == 429 {
                    return Err(LlmError::RateLimited {
                        provider: PROVIDER.to_string(),
                    });
                }
                let text = response.text().await.unwrap_or_default();
                return Err(LlmError::RequestFailed {
                    provider: PROVIDER.to_string(),
                    reason: format!("HTTP {}: {}", code, truncate(&text, 500)),
                });
            }

            return response
                .json::<ChatResponseBody>()
                .await
                .map_err(|e| LlmError::InvalidResponse {
                    provider: PROVIDER.to_string(),
                    reason: e.to_string(),
                });
        }

        Err(LlmError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: "retries exhausted".to_string(),
        })
    }
}

#[async_trait::async_trait]
impl LlmBackend for OpenAiChatBackend {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let body = ChatRequestBody {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self.send(&body).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyResponse {
                provider: PROVIDER.to_string(),
            })
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let cut = s
            .char_indices()
            .take_while(|(i, _)| *i < max_len)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}...", &s[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config(base_url: &str) -> LlmConfig {
        LlmConfig {
            base_url: base_url.to_string(),
            api_key: SecretString::from("test-key"),
            model: "test-model".to_string(),
            max_tokens: 100,
            temperature: 0.1,
        }
    }

    #[test]
    fn api_url_handles_v1_suffix() {
        let with_v1 = OpenAiChatBackend::new(config("https://api.example.com/v1")).unwrap();
        assert_eq!(
            with_v1.api_url(),
            "https://api.example.com/v1/chat/completions"
        );

        let without = OpenAiChatBackend::new(config("https://api.example.com/")).unwrap();
        assert_eq!(
            without.api_url(),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn truncate_is_utf8_safe() {
        assert_eq!(truncate("short", 10), "short");
        let out = truncate("ééééé", 3);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn response_body_decodes_missing_content() {
        let body: ChatResponseBody =
            serde_json::from_str(r#"{"choices": [{"message": {}}]}"#).unwrap();
        assert!(body.choices[0].message.content.is_none());
    }
}
