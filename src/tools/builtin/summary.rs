//! Summarizer tool.
//!
//! Formats processed data into a readable report. Pure in-process formatting,
//! no external I/O; expects the `data` parameter to carry the output of the
//! data-transform tool.

use std::time::Instant;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::tools::{Capability, ParamSpec, ParamType, Tool, ToolResult};

/// Tool rendering processed data into report text.
pub struct SummarizerTool {
    capability: Capability,
}

impl SummarizerTool {
    pub fn new() -> Self {
        let capability = Capability::new(
            "summarize",
            "Generate personalized summaries and reports from processed data",
        )
        .with_parameter(
            "data",
            ParamSpec::new(
                ParamType::Object,
                "Processed data to summarize (typically a data_transform result)",
            )
            .required(),
        )
        .with_parameter(
            "summary_type",
            ParamSpec::new(ParamType::String, "Report layout to produce")
                .one_of(&["weekly_report", "daily_digest", "monthly_overview"])
                .with_default(serde_json::json!("weekly_report")),
        )
        .with_parameter(
            "include_recommendations",
            ParamSpec::new(ParamType::Boolean, "Whether to append recommendations")
                .with_default(serde_json::json!(true)),
        )
        .with_use_cases(&[
            "weekly reports",
            "daily digests",
            "monthly overviews",
            "personalized summaries",
            "insight generation",
        ])
        .with_data_sources(&["processed_data"])
        .with_prerequisites(&["processed_data"])
        .with_confidence_keywords(&[
            "summary", "summarize", "report", "digest", "overview", "recap", "highlights",
        ]);

        Self { capability }
    }
}

impl Default for SummarizerTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SummarizerTool {
    fn capability(&self) -> &Capability {
        &self.capability
    }

    async fn execute(&self, params: serde_json::Value, _ctx: &RequestContext) -> ToolResult {
        let started = Instant::now();
        let name = &self.capability.name;

        let Some(data) = params.get("data").filter(|d| d.is_object()) else {
            return ToolResult::error(name, "data parameter is required");
        };

        let summary_type = params
            .get("summary_type")
            .and_then(|v| v.as_str())
            .unwrap_or("weekly_report");
        let include_recommendations = params
            .get("include_recommendations")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        let title = match summary_type {
            "daily_digest" => "Daily Digest",
            "monthly_overview" => "Monthly Overview",
            _ => "Weekly Report",
        };

        let mut sections = vec![format!("# {}", title)];
        sections.push(overview_section(data));
        if let Some(metrics) = metrics_section(data) {
            sections.push(metrics);
        }
        if include_recommendations {
            sections.push(recommendations_section(data));
        }

        let text = sections.join("\n\n");
        tracing::info!(summary_type, "summary generated");

        ToolResult::success(
            name,
            serde_json::json!({
                "summary_type": summary_type,
                "text": text,
                "section_count": sections.len(),
            }),
        )
        .with_execution_time(started.elapsed())
    }
}

fn overview_section(data: &serde_json::Value) -> String {
    let records = data
        .get("record_count")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);

    let range = data
        .get("analysis")
        .and_then(|a| a.get("date_range"))
        .filter(|r| !r.is_null());

    match range {
        Some(range) => format!(
            "## Overview\n{} records covering {} to {}.",
            records,
            range.get("start").and_then(|v| v.as_str()).unwrap_or("?"),
            range.get("end").and_then(|v| v.as_str()).unwrap_or("?"),
        ),
        None => format!("## Overview\n{} records analyzed.", records),
    }
}

fn metrics_section(data: &serde_json::Value) -> Option<String> {
    let columns = data
        .get("analysis")
        .and_then(|a| a.get("numeric_columns"))
        .and_then(|c| c.as_object())?;
    if columns.is_empty() {
        return None;
    }

    let mut lines = vec!["## Key metrics".to_string()];
    for (name, stats) in columns {
        let mean = stats.get("mean").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let total = stats.get("total").and_then(|v| v.as_f64()).unwrap_or(0.0);
        lines.push(format!("- {}: total {:.1}, average {:.1}", name, total, mean));
    }
    Some(lines.join("\n"))
}

fn recommendations_section(data: &serde_json::Value) -> String {
    let mut lines = vec!["## Recommendations".to_string()];

    let trend_columns = data
        .get("analysis")
        .and_then(|a| a.get("columns"))
        .and_then(|c| c.as_object());

    if let Some(columns) = trend_columns {
        for (name, movement) in columns {
            match movement.get("direction").and_then(|v| v.as_str()) {
                Some("decreasing") => {
                    lines.push(format!("- {} is trending down; consider investigating.", name));
                }
                Some("increasing") => {
                    lines.push(format!("- {} is trending up; keep it going.", name));
                }
                _ => {}
            }
        }
    }

    if lines.len() == 1 {
        lines.push("- No notable movements this period.".to_string());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(params: serde_json::Value) -> ToolResult {
        let tool = SummarizerTool::new();
        let ctx = RequestContext::new();
        tool.execute(params, &ctx).await
    }

    fn processed() -> serde_json::Value {
        serde_json::json!({
            "record_count": 12,
            "analysis": {
                "date_range": {"start": "2026-08-01", "end": "2026-08-07"},
                "numeric_columns": {
                    "duration": {"count": 12, "mean": 30.0, "min": 5.0, "max": 60.0, "total": 360.0}
                }
            }
        })
    }

    #[tokio::test]
    async fn weekly_report_renders_sections() {
        let result = run(serde_json::json!({"data": processed()})).await;
        assert!(result.is_success());

        let data = result.data.unwrap();
        let text = data["text"].as_str().unwrap();
        assert!(text.starts_with("# Weekly Report"));
        assert!(text.contains("12 records covering 2026-08-01 to 2026-08-07"));
        assert!(text.contains("duration: total 360.0, average 30.0"));
        assert!(text.contains("## Recommendations"));
    }

    #[tokio::test]
    async fn digest_title_follows_summary_type() {
        let result = run(serde_json::json!({
            "data": processed(),
            "summary_type": "daily_digest",
        }))
        .await;
        let data = result.data.unwrap();
        assert!(data["text"].as_str().unwrap().starts_with("# Daily Digest"));
    }

    #[tokio::test]
    async fn recommendations_can_be_omitted() {
        let result = run(serde_json::json!({
            "data": processed(),
            "include_recommendations": false,
        }))
        .await;
        let data = result.data.unwrap();
        assert!(!data["text"].as_str().unwrap().contains("Recommendations"));
    }

    #[tokio::test]
    async fn trend_movements_feed_recommendations() {
        let result = run(serde_json::json!({
            "data": {
                "record_count": 4,
                "analysis": {
                    "columns": {
                        "duration": {"earlier_mean": 40.0, "later_mean": 20.0, "direction": "decreasing"}
                    }
                }
            }
        }))
        .await;
        let data = result.data.unwrap();
        assert!(
            data["text"]
                .as_str()
                .unwrap()
                .contains("duration is trending down")
        );
    }

    #[tokio::test]
    async fn missing_data_is_an_error_result() {
        let result = run(serde_json::json!({})).await;
        assert_eq!(result.status, crate::tools::ResultStatus::Error);
    }
}
