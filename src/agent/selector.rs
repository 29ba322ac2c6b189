//! Contextual tool selection on top of registry ranking.
//!
//! The registry ranks by base applicability; the selector then drops tools
//! whose prerequisites are unmet, applies the canonical adjustment rule table,
//! and cuts anything that falls back below the confidence floor.

use std::sync::Arc;

use crate::context::RequestContext;
use crate::tools::scoring::{self, ScoreRule};
use crate::tools::{Tool, ToolRegistry};

/// Near-miss band floor for `suggest_additional_tools`.
const SUGGESTION_FLOOR: f64 = 0.05;

/// Selects and ranks tools for an intent.
pub struct ToolSelector {
    registry: Arc<ToolRegistry>,
    min_confidence: f64,
    rules: Vec<ScoreRule>,
}

impl ToolSelector {
    pub fn new(registry: Arc<ToolRegistry>, min_confidence: f64) -> Self {
        Self {
            registry,
            min_confidence,
            rules: scoring::default_rule_table(),
        }
    }

    /// Override the adjustment rule table (tests, experiments).
    pub fn with_rules(mut self, rules: Vec<ScoreRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Select tools for the intent, sorted by adjusted confidence.
    pub async fn select_tools(
        &self,
        intent: &str,
        context: &RequestContext,
    ) -> Vec<(Arc<dyn Tool>, f64)> {
        let candidates = self
            .registry
            .tools_for_intent(intent, context, self.min_confidence)
            .await;

        let mut selected: Vec<(Arc<dyn Tool>, f64)> = Vec::with_capacity(candidates.len());
        for (tool, confidence) in candidates {
            let cap = tool.capability();
            if let Some(missing) = cap
                .prerequisites
                .iter()
                .find(|key| !context.contains_key(key))
            {
                tracing::debug!(tool = %cap.name, missing = %missing, "dropping tool with unmet prerequisite");
                continue;
            }

            let adjusted =
                scoring::apply_rules(&self.rules, &cap.name, confidence, intent, context);
            if adjusted >= self.min_confidence {
                selected.push((tool, adjusted));
            }
        }

        selected.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let names: Vec<&str> = selected
            .iter()
            .map(|(t, _)| t.capability().name.as_str())
            .collect();
        tracing::info!(count = selected.len(), tools = ?names, "selected tools");

        selected
    }

    /// Tools scoring in the near-miss band `[0.05, min_confidence)` — useful
    /// for understanding why a request selected nothing.
    pub async fn suggest_additional_tools(
        &self,
        intent: &str,
        context: &RequestContext,
    ) -> Vec<String> {
        let mut suggestions = Vec::new();
        for tool in self.registry.enabled_tools().await {
            let confidence = tool.applicability(intent, context);
            if (SUGGESTION_FLOOR..self.min_confidence).contains(&confidence) {
                suggestions.push(format!("{} ({:.2})", tool.capability().name, confidence));
            }
        }
        suggestions
    }

    /// Human-readable explanation of a selection.
    pub fn explain_selection(
        &self,
        intent: &str,
        selected: &[(Arc<dyn Tool>, f64)],
    ) -> String {
        if selected.is_empty() {
            return "No suitable tools found for this request.".to_string();
        }

        let mut lines = vec![
            format!("Selected {} tools for: '{}'", selected.len(), intent),
            String::new(),
        ];
        for (i, (tool, confidence)) in selected.iter().enumerate() {
            let cap = tool.capability();
            lines.push(format!("{}. {} (confidence: {:.2})", i + 1, cap.name, confidence));
            lines.push(format!("   Purpose: {}", cap.description));
            lines.push(format!("   Use cases: {}", cap.use_cases.join(", ")));
            lines.push(String::new());
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubTool;
    use crate::tools::RegistryBuilder;

    async fn selector_with(tools: Vec<StubTool>) -> ToolSelector {
        let mut builder = RegistryBuilder::new();
        for tool in tools {
            builder = builder.with_tool(Arc::new(tool));
        }
        let registry = Arc::new(builder.build());
        registry.initialize().await;
        ToolSelector::new(registry, 0.1)
    }

    #[tokio::test]
    async fn prerequisite_gated_tool_excluded_until_key_present() {
        let selector = selector_with(vec![
            StubTool::new("dated", &["report"]).with_prerequisites(&["date"]),
        ])
        .await;

        let ctx = RequestContext::new();
        // The registry already penalizes the missing prerequisite; give the
        // intent a full match so only the selector's prerequisite filter can
        // drop it (1/1 match - 0.2 penalty = 0.8 >= 0.1).
        assert!(selector.select_tools("report", &ctx).await.is_empty());

        let mut ctx = RequestContext::new();
        ctx.insert("date", "2026-08-07");
        let selected = selector.select_tools("report", &ctx).await;
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].0.capability().name, "dated");
    }

    #[tokio::test]
    async fn recency_penalty_can_drop_a_tool_below_the_floor() {
        let selector = selector_with(vec![
            StubTool::new("borderline", &["alpha", "beta", "gamma", "delta", "epsilon"]),
        ])
        .await;

        // 1/5 = 0.2 base.
        let ctx = RequestContext::new();
        assert_eq!(selector.select_tools("alpha", &ctx).await.len(), 1);

        // Recent use pushes 0.2 to 0.1; still selected (>= floor).
        let mut ctx = RequestContext::new();
        ctx.insert("recent_tool_usage", serde_json::json!(["borderline"]));
        let selected = selector.select_tools("alpha", &ctx).await;
        assert_eq!(selected.len(), 1);
        assert!((selected[0].1 - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn adjusted_ranking_orders_by_confidence() {
        let selector = selector_with(vec![
            StubTool::new("weak", &["alpha", "beta", "gamma"]),
            StubTool::new("document_search", &["alpha", "beta"]),
        ])
        .await;

        // "alpha" + documentation keyword: document_search gets 0.5 + 0.15.
        let ctx = RequestContext::new();
        let selected = selector.select_tools("alpha guide", &ctx).await;
        assert_eq!(selected[0].0.capability().name, "document_search");
        assert!(selected[0].1 > selected[1].1);
    }

    #[tokio::test]
    async fn near_miss_band_is_reported() {
        let selector = selector_with(vec![
            // 1 match out of 15 phrases = 0.066..., inside [0.05, 0.1).
            StubTool::new(
                "faint",
                &[
                    "a1", "a2", "a3", "a4", "a5", "a6", "a7", "a8", "a9", "a10", "a11", "a12",
                    "a13", "a14", "alpha",
                ],
            ),
        ])
        .await;

        let ctx = RequestContext::new();
        assert!(selector.select_tools("alpha", &ctx).await.is_empty());

        let suggestions = selector.suggest_additional_tools("alpha", &ctx).await;
        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].starts_with("faint (0.07"));
    }

    #[tokio::test]
    async fn explanation_lists_selected_tools() {
        let selector = selector_with(vec![StubTool::new("alpha_tool", &["alpha"])]).await;
        let ctx = RequestContext::new();
        let selected = selector.select_tools("alpha", &ctx).await;

        let explanation = selector.explain_selection("alpha", &selected);
        assert!(explanation.contains("Selected 1 tools"));
        assert!(explanation.contains("alpha_tool"));
        assert!(explanation.contains("confidence: 1.00"));

        assert_eq!(
            selector.explain_selection("alpha", &[]),
            "No suitable tools found for this request."
        );
    }
}
