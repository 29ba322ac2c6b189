//! Data-transform tool.
//!
//! Pure in-process analysis of a prior tool's tabular payload: no external
//! I/O. Expects the `data` parameter to carry a `rows` array of objects, the
//! shape produced by the warehouse tool.

use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};

use crate::context::RequestContext;
use crate::tools::{Capability, ParamSpec, ParamType, Tool, ToolResult};

/// Tool deriving insights from raw tabular data.
pub struct DataTransformTool {
    capability: Capability,
}

impl DataTransformTool {
    pub fn new() -> Self {
        let capability = Capability::new(
            "data_transform",
            "Process and analyze raw data to generate insights",
        )
        .with_parameter(
            "data",
            ParamSpec::new(
                ParamType::Object,
                "Raw data to analyze (typically a warehouse result)",
            )
            .required(),
        )
        .with_parameter(
            "analysis_type",
            ParamSpec::new(ParamType::String, "Type of analysis to perform")
                .one_of(&["summary", "trends", "patterns", "comparison"])
                .with_default(serde_json::json!("summary")),
        )
        .with_parameter(
            "time_period",
            ParamSpec::new(ParamType::String, "Time period for analysis")
                .one_of(&["daily", "weekly", "monthly"])
                .with_default(serde_json::json!("weekly")),
        )
        .with_use_cases(&[
            "data processing",
            "insights",
            "trends",
            "patterns",
            "analysis",
            "metrics",
            "statistics",
            "recommendations",
        ])
        .with_data_sources(&["processed_data"])
        .with_prerequisites(&["raw_data"])
        .with_confidence_keywords(&[
            "analyze", "process", "insights", "trends", "patterns", "statistics", "metrics",
            "analysis",
        ]);

        Self { capability }
    }
}

impl Default for DataTransformTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for DataTransformTool {
    fn capability(&self) -> &Capability {
        &self.capability
    }

    async fn execute(&self, params: serde_json::Value, _ctx: &RequestContext) -> ToolResult {
        let started = Instant::now();
        let name = &self.capability.name;

        let rows = match params
            .get("data")
            .and_then(|d| d.get("rows"))
            .and_then(|r| r.as_array())
        {
            Some(rows) => rows,
            None => {
                return ToolResult::error(
                    name,
                    "data parameter must contain a 'rows' array of records",
                );
            }
        };

        let analysis_type = params
            .get("analysis_type")
            .and_then(|v| v.as_str())
            .unwrap_or("summary");
        let time_period = params
            .get("time_period")
            .and_then(|v| v.as_str())
            .unwrap_or("weekly");

        let analysis = match analysis_type {
            "trends" => analyze_trends(rows),
            "patterns" => analyze_patterns(rows),
            "comparison" => analyze_comparison(rows),
            _ => summarize(rows),
        };

        let data = serde_json::json!({
            "analysis_type": analysis_type,
            "time_period": time_period,
            "record_count": rows.len(),
            "analysis": analysis,
        });

        tracing::info!(records = rows.len(), analysis_type, "data transform completed");
        ToolResult::success(name, data).with_execution_time(started.elapsed())
    }
}

/// Per-column numeric statistics plus overall counts.
fn summarize(rows: &[serde_json::Value]) -> serde_json::Value {
    let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for row in rows {
        if let Some(obj) = row.as_object() {
            for (key, value) in obj {
                if let Some(n) = value.as_f64() {
                    columns.entry(key.clone()).or_default().push(n);
                }
            }
        }
    }

    let numeric_stats: BTreeMap<String, serde_json::Value> = columns
        .into_iter()
        .map(|(name, values)| {
            let count = values.len();
            let sum: f64 = values.iter().sum();
            let mean = sum / count as f64;
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            (
                name,
                serde_json::json!({
                    "count": count,
                    "mean": mean,
                    "min": min,
                    "max": max,
                    "total": sum,
                }),
            )
        })
        .collect();

    serde_json::json!({
        "total_records": rows.len(),
        "numeric_columns": numeric_stats,
        "date_range": date_range(rows),
    })
}

/// Direction of movement between the first and second half of the rows.
fn analyze_trends(rows: &[serde_json::Value]) -> serde_json::Value {
    if rows.len() < 2 {
        return serde_json::json!({
            "trend": "insufficient_data",
            "detail": "at least two records are required for a trend",
        });
    }

    let mid = rows.len() / 2;
    let (first, second) = rows.split_at(mid);

    let first_means = column_means(first);
    let second_means = column_means(second);

    let mut movements = serde_json::Map::new();
    for (column, first_mean) in &first_means {
        if let Some(second_mean) = second_means.get(column) {
            let direction = if second_mean > first_mean {
                "increasing"
            } else if second_mean < first_mean {
                "decreasing"
            } else {
                "flat"
            };
            movements.insert(
                column.clone(),
                serde_json::json!({
                    "earlier_mean": first_mean,
                    "later_mean": second_mean,
                    "direction": direction,
                }),
            );
        }
    }

    serde_json::json!({
        "trend": "computed",
        "columns": movements,
    })
}

/// Weekday distribution and weekday/weekend split over a date-like column.
fn analyze_patterns(rows: &[serde_json::Value]) -> serde_json::Value {
    let mut by_weekday: BTreeMap<String, u64> = BTreeMap::new();
    let mut weekday_count = 0u64;
    let mut weekend_count = 0u64;

    for row in rows {
        if let Some(date) = row_date(row) {
            let day = date.weekday();
            *by_weekday.entry(day.to_string()).or_insert(0) += 1;
            if matches!(day, chrono::Weekday::Sat | chrono::Weekday::Sun) {
                weekend_count += 1;
            } else {
                weekday_count += 1;
            }
        }
    }

    if by_weekday.is_empty() {
        return serde_json::json!({
            "patterns": "no_date_column",
            "detail": "records carry no parseable date field",
        });
    }

    serde_json::json!({
        "by_weekday": by_weekday,
        "weekday_records": weekday_count,
        "weekend_records": weekend_count,
    })
}

/// First-half vs second-half metric comparison with percentage change.
fn analyze_comparison(rows: &[serde_json::Value]) -> serde_json::Value {
    if rows.len() < 2 {
        return serde_json::json!({
            "comparison": "insufficient_data",
        });
    }

    let mid = rows.len() / 2;
    let (previous, current) = rows.split_at(mid);

    let previous_means = column_means(previous);
    let current_means = column_means(current);

    let mut changes = serde_json::Map::new();
    for (column, previous_mean) in &previous_means {
        if let Some(current_mean) = current_means.get(column) {
            let change_pct = if *previous_mean != 0.0 {
                (current_mean - previous_mean) / previous_mean.abs() * 100.0
            } else {
                0.0
            };
            changes.insert(
                column.clone(),
                serde_json::json!({
                    "previous": previous_mean,
                    "current": current_mean,
                    "change_pct": (change_pct * 100.0).round() / 100.0,
                }),
            );
        }
    }

    serde_json::json!({
        "previous_records": previous.len(),
        "current_records": current.len(),
        "changes": changes,
    })
}

fn column_means(rows: &[serde_json::Value]) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for row in rows {
        if let Some(obj) = row.as_object() {
            for (key, value) in obj {
                if let Some(n) = value.as_f64() {
                    let entry = sums.entry(key.clone()).or_insert((0.0, 0));
                    entry.0 += n;
                    entry.1 += 1;
                }
            }
        }
    }
    sums.into_iter()
        .map(|(k, (sum, count))| (k, sum / count as f64))
        .collect()
}

/// Pull a date out of the row's `date` or `timestamp` field.
fn row_date(row: &serde_json::Value) -> Option<NaiveDate> {
    let raw = row
        .get("date")
        .or_else(|| row.get("timestamp"))
        .and_then(|v| v.as_str())?;
    let prefix = if raw.len() >= 10 { raw.get(0..10)? } else { raw };
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

fn date_range(rows: &[serde_json::Value]) -> serde_json::Value {
    let dates: Vec<NaiveDate> = rows.iter().filter_map(row_date).collect();
    match (dates.iter().min(), dates.iter().max()) {
        (Some(start), Some(end)) => serde_json::json!({
            "start": start.to_string(),
            "end": end.to_string(),
        }),
        _ => serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> serde_json::Value {
        serde_json::json!({
            "rows": [
                {"date": "2026-08-03", "duration": 10.0, "kind": "run"},
                {"date": "2026-08-04", "duration": 20.0, "kind": "walk"},
                {"date": "2026-08-08", "duration": 40.0, "kind": "run"},
                {"date": "2026-08-09", "duration": 50.0, "kind": "swim"},
            ]
        })
    }

    async fn run(params: serde_json::Value) -> ToolResult {
        let tool = DataTransformTool::new();
        let ctx = RequestContext::new();
        tool.execute(params, &ctx).await
    }

    #[tokio::test]
    async fn summary_reports_numeric_stats_and_date_range() {
        let result = run(serde_json::json!({"data": rows(), "analysis_type": "summary"})).await;
        assert!(result.is_success());

        let data = result.data.unwrap();
        assert_eq!(data["record_count"], 4);
        let duration = &data["analysis"]["numeric_columns"]["duration"];
        assert_eq!(duration["count"], 4);
        assert_eq!(duration["mean"], 30.0);
        assert_eq!(data["analysis"]["date_range"]["start"], "2026-08-03");
        assert_eq!(data["analysis"]["date_range"]["end"], "2026-08-09");
    }

    #[tokio::test]
    async fn trends_detect_direction() {
        let result = run(serde_json::json!({"data": rows(), "analysis_type": "trends"})).await;
        let data = result.data.unwrap();
        assert_eq!(
            data["analysis"]["columns"]["duration"]["direction"],
            "increasing"
        );
    }

    #[tokio::test]
    async fn patterns_split_weekdays_and_weekends() {
        let result = run(serde_json::json!({"data": rows(), "analysis_type": "patterns"})).await;
        let data = result.data.unwrap();
        // Aug 8/9 2026 fall on a weekend; Aug 3/4 are weekdays.
        assert_eq!(data["analysis"]["weekday_records"], 2);
        assert_eq!(data["analysis"]["weekend_records"], 2);
    }

    #[tokio::test]
    async fn comparison_reports_percentage_change() {
        let result =
            run(serde_json::json!({"data": rows(), "analysis_type": "comparison"})).await;
        let data = result.data.unwrap();
        let change = &data["analysis"]["changes"]["duration"];
        assert_eq!(change["previous"], 15.0);
        assert_eq!(change["current"], 45.0);
        assert_eq!(change["change_pct"], 200.0);
    }

    #[tokio::test]
    async fn missing_rows_is_an_error_result() {
        let result = run(serde_json::json!({"data": {"not_rows": []}})).await;
        assert_eq!(result.status, crate::tools::ResultStatus::Error);
        assert!(result.error.unwrap().contains("rows"));
    }

    #[test]
    fn prerequisite_gates_selection_without_raw_data() {
        let tool = DataTransformTool::new();
        let ctx = RequestContext::new();
        // Every keyword matches, but the missing prerequisite subtracts 0.2.
        let bare = tool.applicability("analyze patterns", &ctx);

        let mut with_data = RequestContext::new();
        with_data.insert("raw_data", true);
        let gated = tool.applicability("analyze patterns", &with_data);
        assert!((gated - bare - 0.2).abs() < 1e-9);
    }
}
