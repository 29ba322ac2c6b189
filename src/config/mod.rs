//! Environment-driven configuration.
//!
//! All settings resolve from environment variables (with `.env` support via
//! `dotenvy` in `main`). Secrets are wrapped in [`SecretString`] so they never
//! appear in debug output.

mod helpers;

use secrecy::SecretString;

use crate::error::ConfigError;

pub use helpers::{optional_env, parse_bool_env, parse_optional_env, require_env};

/// Language-model backend configuration (OpenAI-compatible chat endpoint).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of the chat-completions endpoint.
    pub base_url: String,
    /// API key (required).
    pub api_key: SecretString,
    /// Model identifier.
    pub model: String,
    /// Maximum tokens per completion.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl LlmConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: optional_env("LLM_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            api_key: SecretString::from(require_env(
                "LLM_API_KEY",
                "Set LLM_API_KEY to your chat-completions API key",
            )?),
            model: optional_env("LLM_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            max_tokens: parse_optional_env("LLM_MAX_TOKENS", 4000)?,
            temperature: parse_optional_env("LLM_TEMPERATURE", 0.1)?,
        })
    }
}

/// Tunables for the orchestration loop and tool selection.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum tool-execution iterations per request.
    pub max_iterations: usize,
    /// Minimum confidence for a tool to be selected.
    pub min_confidence: f64,
    /// Maximum session history entries retained.
    pub max_history: usize,
}

impl AgentConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            max_iterations: parse_optional_env("AGENT_MAX_ITERATIONS", 3)?,
            min_confidence: parse_optional_env("AGENT_MIN_CONFIDENCE", 0.1)?,
            max_history: parse_optional_env("AGENT_MAX_HISTORY", 50)?,
        })
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            min_confidence: 0.1,
            max_history: 50,
        }
    }
}

/// Warehouse SQL-gateway configuration.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    pub enabled: bool,
    /// Base URL of the SQL gateway.
    pub gateway_url: String,
    /// Gateway auth token.
    pub auth_token: Option<SecretString>,
    /// How long a gateway session is reused before reconnecting, in seconds.
    pub session_ttl_secs: u64,
    /// Default row cap applied to query results.
    pub default_row_limit: usize,
}

impl WarehouseConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            enabled: parse_bool_env("WAREHOUSE_ENABLED", true)?,
            gateway_url: optional_env("WAREHOUSE_GATEWAY_URL")
                .unwrap_or_else(|| "http://localhost:9470".to_string()),
            auth_token: optional_env("WAREHOUSE_AUTH_TOKEN").map(SecretString::from),
            session_ttl_secs: parse_optional_env("WAREHOUSE_SESSION_TTL_SECS", 3600)?,
            default_row_limit: parse_optional_env("WAREHOUSE_DEFAULT_ROW_LIMIT", 1000)?,
        })
    }
}

/// Document-store search configuration.
#[derive(Debug, Clone)]
pub struct DocumentsConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: Option<SecretString>,
}

impl DocumentsConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            enabled: parse_bool_env("DOCUMENTS_ENABLED", true)?,
            base_url: optional_env("DOCUMENTS_BASE_URL")
                .unwrap_or_else(|| "http://localhost:9471".to_string()),
            api_key: optional_env("DOCUMENTS_API_KEY").map(SecretString::from),
        })
    }
}

/// Knowledge-base search configuration.
#[derive(Debug, Clone)]
pub struct KnowledgeConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_token: Option<SecretString>,
}

impl KnowledgeConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            enabled: parse_bool_env("KNOWLEDGE_ENABLED", false)?,
            base_url: optional_env("KNOWLEDGE_BASE_URL")
                .unwrap_or_else(|| "http://localhost:9472".to_string()),
            api_token: optional_env("KNOWLEDGE_API_TOKEN").map(SecretString::from),
        })
    }
}

/// Team-messaging configuration.
#[derive(Debug, Clone)]
pub struct MessagingConfig {
    pub enabled: bool,
    pub base_url: String,
    pub bot_token: Option<SecretString>,
}

impl MessagingConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            enabled: parse_bool_env("MESSAGING_ENABLED", false)?,
            base_url: optional_env("MESSAGING_BASE_URL")
                .unwrap_or_else(|| "http://localhost:9473".to_string()),
            bot_token: optional_env("MESSAGING_BOT_TOKEN").map(SecretString::from),
        })
    }
}

/// Per-integration tool configuration.
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    pub warehouse: WarehouseConfig,
    pub documents: DocumentsConfig,
    pub knowledge: KnowledgeConfig,
    pub messaging: MessagingConfig,
}

/// HTTP API surface configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            host: optional_env("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_optional_env("SERVER_PORT", 8080)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Complete application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub tools: ToolsConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Resolve the full configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            llm: LlmConfig::resolve()?,
            agent: AgentConfig::resolve()?,
            tools: ToolsConfig {
                warehouse: WarehouseConfig::resolve()?,
                documents: DocumentsConfig::resolve()?,
                knowledge: KnowledgeConfig::resolve()?,
                messaging: MessagingConfig::resolve()?,
            },
            server: ServerConfig::resolve()?,
        })
    }
}
