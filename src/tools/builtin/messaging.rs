//! Team-messaging tool.
//!
//! Posts messages and notifications to a team chat API. Disabled unless a bot
//! token is configured.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;

use crate::config::MessagingConfig;
use crate::context::RequestContext;
use crate::tools::{Capability, ParamSpec, ParamType, Tool, ToolResult, require_str};

/// Tool sending messages to the team chat.
pub struct SendMessageTool {
    http: Client,
    config: MessagingConfig,
    capability: Capability,
}

impl SendMessageTool {
    pub fn new(config: MessagingConfig) -> Self {
        let capability = Capability::new(
            "send_message",
            "Send messages and notifications to the team chat",
        )
        .with_parameter(
            "channel",
            ParamSpec::new(
                ParamType::String,
                "Channel name or ID (e.g. #general, @username)",
            )
            .required(),
        )
        .with_parameter(
            "message",
            ParamSpec::new(ParamType::String, "Message content to send").required(),
        )
        .with_parameter(
            "message_type",
            ParamSpec::new(ParamType::String, "Type of message")
                .one_of(&["notification", "update", "alert", "summary", "reminder"])
                .with_default(serde_json::json!("notification")),
        )
        .with_parameter(
            "format",
            ParamSpec::new(ParamType::String, "Message format")
                .one_of(&["plain", "markdown"])
                .with_default(serde_json::json!("markdown")),
        )
        .with_parameter(
            "thread_id",
            ParamSpec::new(ParamType::String, "Parent message ID to reply in thread"),
        )
        .with_use_cases(&[
            "team notifications",
            "status updates",
            "alerts",
            "summary sharing",
            "team communication",
            "automated reporting",
        ])
        .with_data_sources(&["team_chat"])
        .with_confidence_keywords(&[
            "notify", "message", "send", "communicate", "alert", "update team", "tell team",
            "inform",
        ]);

        Self {
            http: Client::new(),
            config,
            capability,
        }
    }
}

#[async_trait]
impl Tool for SendMessageTool {
    fn capability(&self) -> &Capability {
        &self.capability
    }

    fn enabled(&self) -> bool {
        self.config.enabled && self.config.bot_token.is_some()
    }

    async fn execute(&self, params: serde_json::Value, _ctx: &RequestContext) -> ToolResult {
        let started = Instant::now();
        let name = &self.capability.name;

        let Some(token) = &self.config.bot_token else {
            return ToolResult::error(name, "messaging not configured: bot token required");
        };

        let channel = match require_str(&params, "channel") {
            Ok(c) => c.to_string(),
            Err(e) => return ToolResult::error(name, e.to_string()),
        };
        let message = match require_str(&params, "message") {
            Ok(m) => m.to_string(),
            Err(e) => return ToolResult::error(name, e.to_string()),
        };

        let mut body = serde_json::json!({
            "channel": channel,
            "text": message,
            "format": params.get("format").cloned().unwrap_or_else(|| serde_json::json!("markdown")),
        });
        if let Some(thread_id) = params.get("thread_id").and_then(|v| v.as_str()) {
            body["thread_id"] = serde_json::json!(thread_id);
        }

        let url = format!(
            "{}/api/chat.postMessage",
            self.config.base_url.trim_end_matches('/')
        );

        match self
            .http
            .post(&url)
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                tracing::info!(channel = %channel, "message sent");
                ToolResult::success(
                    name,
                    serde_json::json!({
                        "channel": channel,
                        "delivered": true,
                        "message_type": params.get("message_type"),
                    }),
                )
                .with_execution_time(started.elapsed())
            }
            Ok(response) => ToolResult::error(
                name,
                format!("chat API returned HTTP {}", response.status()),
            )
            .with_execution_time(started.elapsed()),
            Err(e) => ToolResult::error(name, format!("chat API request failed: {}", e))
                .with_execution_time(started.elapsed()),
        }
    }
}
