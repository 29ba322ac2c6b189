//! Document-store search tool.
//!
//! Finds documentation, guidelines, templates, and similar reference material
//! in an HTTP document store.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::config::DocumentsConfig;
use crate::context::RequestContext;
use crate::tools::{
    Capability, ParamSpec, ParamType, Tool, ToolResult, opt_usize, require_str,
};

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: String,
    title: String,
    #[serde(default)]
    doc_type: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

/// Tool searching the document store.
pub struct DocumentSearchTool {
    http: Client,
    config: DocumentsConfig,
    capability: Capability,
}

impl DocumentSearchTool {
    pub fn new(config: DocumentsConfig) -> Self {
        let capability = Capability::new(
            "document_search",
            "Search and retrieve documents from the document store",
        )
        .with_parameter(
            "query",
            ParamSpec::new(ParamType::String, "Search query for finding documents").required(),
        )
        .with_parameter(
            "doc_types",
            ParamSpec::new(ParamType::Array, "Document types to search for")
                .with_default(serde_json::json!(["pdf", "doc", "docx", "txt"])),
        )
        .with_parameter(
            "max_results",
            ParamSpec::new(ParamType::Integer, "Maximum number of results to return")
                .with_default(serde_json::json!(10))
                .with_range(1, 50),
        )
        .with_parameter(
            "include_content",
            ParamSpec::new(ParamType::Boolean, "Whether to include document content")
                .with_default(serde_json::json!(true)),
        )
        .with_use_cases(&[
            "documentation",
            "guidelines",
            "templates",
            "policies",
            "procedures",
            "manuals",
            "examples",
            "references",
        ])
        .with_data_sources(&["document_store"])
        .with_confidence_keywords(&[
            "document",
            "guide",
            "guideline",
            "template",
            "policy",
            "procedure",
            "manual",
            "example",
            "reference",
            "documentation",
            "format",
            "standard",
            "specification",
        ]);

        Self {
            http: Client::new(),
            config,
            capability,
        }
    }

    async fn search(
        &self,
        query: &str,
        doc_types: &[String],
        max_results: usize,
    ) -> Result<Vec<SearchHit>, String> {
        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));
        let mut request = self.http.post(&url).json(&serde_json::json!({
            "query": query,
            "doc_types": doc_types,
            "limit": max_results,
        }));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("document store request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!(
                "document store returned HTTP {}",
                response.status()
            ));
        }

        response
            .json::<SearchResponse>()
            .await
            .map(|r| r.hits)
            .map_err(|e| format!("invalid document store response: {}", e))
    }
}

#[async_trait]
impl Tool for DocumentSearchTool {
    fn capability(&self) -> &Capability {
        &self.capability
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn execute(&self, params: serde_json::Value, _ctx: &RequestContext) -> ToolResult {
        let started = Instant::now();
        let name = &self.capability.name;

        let query = match require_str(&params, "query") {
            Ok(q) => q.to_string(),
            Err(e) => return ToolResult::error(name, e.to_string()),
        };
        let doc_types: Vec<String> = params
            .get("doc_types")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        let max_results = opt_usize(&params, "max_results", 10);
        let include_content = params
            .get("include_content")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        match self.search(&query, &doc_types, max_results).await {
            Ok(hits) => {
                let documents: Vec<serde_json::Value> = hits
                    .into_iter()
                    .map(|hit| {
                        serde_json::json!({
                            "id": hit.id,
                            "title": hit.title,
                            "doc_type": hit.doc_type,
                            "url": hit.url,
                            "snippet": hit.snippet,
                            "content": if include_content { hit.content } else { None },
                        })
                    })
                    .collect();

                tracing::info!(count = documents.len(), "document search completed");
                ToolResult::success(
                    name,
                    serde_json::json!({
                        "documents": documents,
                        "total_results": documents.len(),
                        "search_query": query,
                    }),
                )
                .with_metadata(serde_json::json!({"include_content": include_content}))
                .with_execution_time(started.elapsed())
            }
            Err(reason) => {
                tracing::error!(error = %reason, "document search failed");
                ToolResult::error(name, reason).with_execution_time(started.elapsed())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(enabled: bool) -> DocumentSearchTool {
        DocumentSearchTool::new(DocumentsConfig {
            enabled,
            base_url: "http://localhost:1".to_string(),
            api_key: None,
        })
    }

    #[test]
    fn documentation_vocabulary_scores() {
        let t = tool(true);
        let ctx = RequestContext::new();
        let score = t.applicability("find the formatting guideline document", &ctx);
        assert!(score > 0.1);
    }

    #[test]
    fn disabled_tool_scores_zero() {
        let t = tool(false);
        let ctx = RequestContext::new();
        assert_eq!(t.applicability("find the guideline document", &ctx), 0.0);
    }

    #[tokio::test]
    async fn unreachable_store_yields_error_result() {
        let t = tool(true);
        let ctx = RequestContext::new();
        let result = t
            .execute(serde_json::json!({"query": "style guide"}), &ctx)
            .await;
        assert_eq!(result.status, crate::tools::ResultStatus::Error);
    }

    #[test]
    fn max_results_range_is_declared() {
        let t = tool(true);
        let spec = &t.capability().parameters["max_results"];
        assert_eq!(spec.minimum, Some(1));
        assert_eq!(spec.maximum, Some(50));
    }
}
