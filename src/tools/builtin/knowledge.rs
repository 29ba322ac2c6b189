//! Knowledge-base search tool.
//!
//! Searches a team wiki / knowledge-base API. Selection is gated on the
//! `knowledge_api_token` context key, so the planner only sees this tool when
//! the caller supplied workspace credentials for the request.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::config::KnowledgeConfig;
use crate::context::RequestContext;
use crate::tools::{
    Capability, ParamSpec, ParamType, Tool, ToolResult, opt_usize, require_str,
};

#[derive(Debug, Deserialize)]
struct PageHit {
    id: String,
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    page_type: Option<String>,
    #[serde(default)]
    excerpt: Option<String>,
    #[serde(default)]
    last_edited: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageSearchResponse {
    #[serde(default)]
    results: Vec<PageHit>,
}

/// Tool searching the knowledge base.
pub struct KnowledgeSearchTool {
    http: Client,
    config: KnowledgeConfig,
    capability: Capability,
}

impl KnowledgeSearchTool {
    pub fn new(config: KnowledgeConfig) -> Self {
        let capability = Capability::new(
            "knowledge_search",
            "Search and retrieve content from the team knowledge base",
        )
        .with_parameter(
            "query",
            ParamSpec::new(ParamType::String, "Search query for knowledge-base content")
                .required(),
        )
        .with_parameter(
            "page_types",
            ParamSpec::new(ParamType::Array, "Types of pages to search")
                .with_default(serde_json::json!(["page", "database"])),
        )
        .with_parameter(
            "limit",
            ParamSpec::new(ParamType::Integer, "Maximum number of results to return")
                .with_default(serde_json::json!(10))
                .with_range(1, 50),
        )
        .with_parameter(
            "include_archived",
            ParamSpec::new(ParamType::Boolean, "Whether to include archived pages")
                .with_default(serde_json::json!(false)),
        )
        .with_use_cases(&[
            "team knowledge",
            "project documentation",
            "meeting notes",
            "knowledge base search",
            "team wikis",
        ])
        .with_data_sources(&["knowledge_base"])
        .with_prerequisites(&["knowledge_api_token"])
        .with_confidence_keywords(&[
            "team docs",
            "project",
            "meeting notes",
            "collaboration",
            "wiki",
            "knowledge base",
            "team knowledge",
        ]);

        Self {
            http: Client::new(),
            config,
            capability,
        }
    }

    fn is_configured(&self) -> bool {
        self.config.api_token.is_some()
    }
}

#[async_trait]
impl Tool for KnowledgeSearchTool {
    fn capability(&self) -> &Capability {
        &self.capability
    }

    fn enabled(&self) -> bool {
        self.config.enabled && self.is_configured()
    }

    async fn execute(&self, params: serde_json::Value, _ctx: &RequestContext) -> ToolResult {
        let started = Instant::now();
        let name = &self.capability.name;

        let Some(token) = &self.config.api_token else {
            return ToolResult::error(name, "knowledge base not configured: API token required");
        };

        let query = match require_str(&params, "query") {
            Ok(q) => q.to_string(),
            Err(e) => return ToolResult::error(name, e.to_string()),
        };
        let limit = opt_usize(&params, "limit", 10);
        let include_archived = params
            .get("include_archived")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let page_types = params
            .get("page_types")
            .cloned()
            .unwrap_or_else(|| serde_json::json!(["page", "database"]));

        let url = format!("{}/v1/search", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(token.expose_secret())
            .json(&serde_json::json!({
                "query": query,
                "page_types": page_types,
                "page_size": limit,
                "include_archived": include_archived,
            }))
            .send()
            .await;

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                return ToolResult::error(
                    name,
                    format!("knowledge base returned HTTP {}", r.status()),
                )
                .with_execution_time(started.elapsed());
            }
            Err(e) => {
                return ToolResult::error(name, format!("knowledge base request failed: {}", e))
                    .with_execution_time(started.elapsed());
            }
        };

        match response.json::<PageSearchResponse>().await {
            Ok(body) => {
                let pages: Vec<serde_json::Value> = body
                    .results
                    .into_iter()
                    .map(|p| {
                        serde_json::json!({
                            "id": p.id,
                            "title": p.title,
                            "url": p.url,
                            "type": p.page_type,
                            "content_snippet": p.excerpt,
                            "last_edited": p.last_edited,
                        })
                    })
                    .collect();

                tracing::info!(count = pages.len(), "knowledge-base search completed");
                ToolResult::success(
                    name,
                    serde_json::json!({
                        "pages": pages,
                        "total_results": pages.len(),
                        "search_query": query,
                    }),
                )
                .with_execution_time(started.elapsed())
            }
            Err(e) => ToolResult::error(name, format!("invalid knowledge-base response: {}", e))
                .with_execution_time(started.elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn tool(token: Option<&str>) -> KnowledgeSearchTool {
        KnowledgeSearchTool::new(KnowledgeConfig {
            enabled: true,
            base_url: "http://localhost:1".to_string(),
            api_token: token.map(SecretString::from),
        })
    }

    #[test]
    fn unconfigured_tool_is_disabled_and_scores_zero() {
        let t = tool(None);
        assert!(!t.enabled());
        let ctx = RequestContext::new();
        assert_eq!(t.applicability("search the team wiki", &ctx), 0.0);
    }

    #[test]
    fn configured_tool_requires_context_token_for_full_score() {
        let t = tool(Some("secret"));
        assert!(t.enabled());

        // Prerequisite missing: 0.2 penalty applies.
        let bare = RequestContext::new();
        let penalized = t.applicability("search the team wiki knowledge base", &bare);

        let mut ctx = RequestContext::new();
        ctx.insert("knowledge_api_token", "present");
        let full = t.applicability("search the team wiki knowledge base", &ctx);

        assert!((full - penalized - 0.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unreachable_api_yields_error_result() {
        let t = tool(Some("secret"));
        let ctx = RequestContext::new();
        let result = t
            .execute(serde_json::json!({"query": "onboarding notes"}), &ctx)
            .await;
        assert_eq!(result.status, crate::tools::ResultStatus::Error);
    }
}
