//! Warehouse query tool and its SQL-gateway client.
//!
//! The client is an explicit resource handle owned by the composition root
//! and passed into the tool. Session reuse is a small internal state machine:
//! `valid → expired | broken → reconnecting → valid`. A query that fails
//! against an invalid session triggers exactly one reconnect attempt.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::WarehouseConfig;
use crate::context::RequestContext;
use crate::tools::{
    Capability, ParamSpec, ParamType, Tool, ToolError, ToolResult, opt_usize, require_str,
};

/// Result sets larger than this are summarized instead of returned wholesale.
const SUMMARY_THRESHOLD: usize = 100;
/// Rows included in a summarized result.
const SAMPLE_ROWS: usize = 10;

/// Session lifecycle phase inside the gateway client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionPhase {
    Valid,
    Expired,
    Broken,
    Reconnecting,
}

#[derive(Debug)]
struct SessionSlot {
    token: Option<String>,
    established_at: Option<DateTime<Utc>>,
    phase: SessionPhase,
}

impl SessionSlot {
    fn empty() -> Self {
        Self {
            token: None,
            established_at: None,
            phase: SessionPhase::Expired,
        }
    }
}

/// Tabular payload returned by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryPayload {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    token: String,
}

/// HTTP client for the warehouse SQL gateway with session reuse.
pub struct WarehouseClient {
    http: Client,
    config: WarehouseConfig,
    session: Mutex<SessionSlot>,
}

impl WarehouseClient {
    pub fn new(config: WarehouseConfig) -> Self {
        Self {
            http: Client::new(),
            config,
            session: Mutex::new(SessionSlot::empty()),
        }
    }

    fn gateway_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.gateway_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn session_ttl(&self) -> Duration {
        Duration::seconds(self.config.session_ttl_secs as i64)
    }

    /// Get a usable session token, reconnecting when the current one is
    /// expired or broken.
    async fn session_token(&self) -> Result<String, ToolError> {
        let mut slot = self.session.lock().await;

        if slot.phase == SessionPhase::Valid
            && let (Some(token), Some(established)) = (&slot.token, slot.established_at)
        {
            if Utc::now() - established < self.session_ttl() {
                tracing::debug!("reusing warehouse gateway session");
                return Ok(token.clone());
            }
            tracing::debug!("warehouse gateway session expired");
            slot.phase = SessionPhase::Expired;
        }

        self.reconnect(&mut slot).await
    }

    async fn reconnect(&self, slot: &mut SessionSlot) -> Result<String, ToolError> {
        slot.phase = SessionPhase::Reconnecting;
        slot.token = None;

        tracing::info!("opening new warehouse gateway session");
        let mut request = self.http.post(self.gateway_url("v1/sessions"));
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            slot.phase = SessionPhase::Broken;
            ToolError::ExternalService(format!("failed to open gateway session: {}", e))
        })?;

        if !response.status().is_success() {
            slot.phase = SessionPhase::Broken;
            return Err(ToolError::ExternalService(format!(
                "gateway session request returned HTTP {}",
                response.status()
            )));
        }

        let session: SessionResponse = response.json().await.map_err(|e| {
            slot.phase = SessionPhase::Broken;
            ToolError::ExternalService(format!("invalid gateway session response: {}", e))
        })?;

        slot.token = Some(session.token.clone());
        slot.established_at = Some(Utc::now());
        slot.phase = SessionPhase::Valid;
        Ok(session.token)
    }

    async fn run_statement(&self, token: &str, statement: &str) -> Result<QueryPayload, ToolError> {
        let response = self
            .http
            .post(self.gateway_url("v1/statements"))
            .bearer_auth(token)
            .json(&serde_json::json!({ "statement": statement }))
            .send()
            .await
            .map_err(|e| ToolError::ExternalService(format!("statement request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ToolError::ExternalService("gateway session rejected".to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::ExternalService(format!(
                "statement returned HTTP {}: {}",
                status, body
            )));
        }

        response
            .json::<QueryPayload>()
            .await
            .map_err(|e| ToolError::ExternalService(format!("invalid statement response: {}", e)))
    }

    /// Execute a SQL statement, reconnecting once on a rejected session.
    pub async fn query(&self, statement: &str) -> Result<QueryPayload, ToolError> {
        let token = self.session_token().await?;

        match self.run_statement(&token, statement).await {
            Ok(payload) => Ok(payload),
            Err(ToolError::ExternalService(reason)) if reason.contains("session rejected") => {
                tracing::info!("gateway session rejected, reconnecting once");
                let mut slot = self.session.lock().await;
                slot.phase = SessionPhase::Broken;
                let token = self.reconnect(&mut slot).await?;
                drop(slot);
                self.run_statement(&token, statement).await
            }
            Err(e) => Err(e),
        }
    }

    /// Probe the gateway without running a statement.
    pub async fn ping(&self) -> bool {
        self.session_token().await.is_ok()
    }
}

/// Tool executing SQL against the warehouse gateway.
pub struct WarehouseQueryTool {
    client: Arc<WarehouseClient>,
    capability: Capability,
    enabled: bool,
    default_row_limit: usize,
}

impl WarehouseQueryTool {
    pub fn new(client: Arc<WarehouseClient>, config: &WarehouseConfig) -> Self {
        let capability = Capability::new(
            "warehouse_query",
            "Execute SQL queries against the data warehouse to retrieve and analyze data",
        )
        .with_parameter(
            "query",
            ParamSpec::new(ParamType::String, "SQL statement to execute").required(),
        )
        .with_parameter(
            "limit",
            ParamSpec::new(ParamType::Integer, "Maximum number of rows to return")
                .with_default(serde_json::json!(config.default_row_limit as i64)),
        )
        .with_use_cases(&[
            "query user activity data",
            "retrieve historical analytics",
            "get aggregated metrics",
            "extract data for recommendations",
            "analyze user behavior patterns",
            "generate reports from warehouse data",
            "list available tables and schemas",
            "show database structure",
            "describe table information",
        ])
        .with_data_sources(&["warehouse"])
        .with_confidence_keywords(&[
            "data", "query", "sql", "database", "analytics", "metrics", "warehouse", "reports",
            "activity", "users", "tables", "table", "schema", "schemas", "columns", "available",
            "list", "show", "describe", "information", "structure",
        ]);

        Self {
            client,
            capability,
            enabled: config.enabled,
            default_row_limit: config.default_row_limit,
        }
    }

    fn shape_payload(&self, payload: QueryPayload, limit: usize) -> (serde_json::Value, bool) {
        let total_rows = payload.rows.len();
        let truncated = total_rows > limit;
        let limited: Vec<serde_json::Value> = payload.rows.into_iter().take(limit).collect();

        let data = if total_rows > SUMMARY_THRESHOLD {
            serde_json::json!({
                "summary": format!("Query returned {} rows", total_rows),
                "columns": payload.columns,
                "sample_rows": limited.iter().take(SAMPLE_ROWS).collect::<Vec<_>>(),
                "total_rows": total_rows,
                "sample_shown": SAMPLE_ROWS.min(limited.len()),
            })
        } else {
            serde_json::json!({
                "columns": payload.columns,
                "rows": limited,
                "row_count": total_rows.min(limit),
                "truncated": truncated,
                "total_available": total_rows,
            })
        };

        (data, truncated)
    }
}

#[async_trait]
impl Tool for WarehouseQueryTool {
    fn capability(&self) -> &Capability {
        &self.capability
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn execute(&self, params: serde_json::Value, _ctx: &RequestContext) -> ToolResult {
        let started = Instant::now();
        let name = &self.capability.name;

        let statement = match require_str(&params, "query") {
            Ok(q) => q,
            Err(e) => return ToolResult::error(name, e.to_string()),
        };
        let limit = opt_usize(&params, "limit", self.default_row_limit);

        match self.client.query(statement).await {
            Ok(payload) => {
                let total = payload.rows.len();
                let (data, truncated) = self.shape_payload(payload, limit);
                tracing::info!(rows = total, truncated, "warehouse query executed");

                let result = if truncated {
                    ToolResult::partial(name, data)
                } else {
                    ToolResult::success(name, data)
                };
                result
                    .with_metadata(serde_json::json!({"statement_rows": total}))
                    .with_execution_time(started.elapsed())
            }
            Err(e) => {
                tracing::error!(error = %e, "warehouse query failed");
                ToolResult::error(name, e.to_string()).with_execution_time(started.elapsed())
            }
        }
    }

    async fn initialize(&self) -> bool {
        if !self.enabled {
            return false;
        }
        // A dead gateway at startup is tolerated; sessions are re-opened per
        // query anyway. Log the probe result for operators.
        let reachable = self.client.ping().await;
        if !reachable {
            tracing::warn!("warehouse gateway unreachable at startup");
        }
        true
    }

    async fn cleanup(&self) {
        let mut slot = self.client.session.lock().await;
        slot.token = None;
        slot.established_at = None;
        slot.phase = SessionPhase::Expired;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WarehouseConfig {
        WarehouseConfig {
            enabled: true,
            gateway_url: "http://localhost:1".to_string(),
            auth_token: None,
            session_ttl_secs: 3600,
            default_row_limit: 1000,
        }
    }

    fn tool() -> WarehouseQueryTool {
        let cfg = config();
        WarehouseQueryTool::new(Arc::new(WarehouseClient::new(cfg.clone())), &cfg)
    }

    #[test]
    fn capability_matches_warehouse_vocabulary() {
        let t = tool();
        let ctx = RequestContext::new();
        let score = t.applicability("show me tables available in the warehouse", &ctx);
        assert!(score > 0.1, "expected keyword overlap to clear the floor, got {score}");
    }

    #[test]
    fn small_result_sets_are_returned_whole() {
        let t = tool();
        let payload = QueryPayload {
            columns: vec!["id".to_string()],
            rows: (0..5).map(|i| serde_json::json!({"id": i})).collect(),
        };
        let (data, truncated) = t.shape_payload(payload, 1000);
        assert!(!truncated);
        assert_eq!(data["row_count"], 5);
        assert_eq!(data["rows"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn large_result_sets_are_summarized() {
        let t = tool();
        let payload = QueryPayload {
            columns: vec!["id".to_string()],
            rows: (0..250).map(|i| serde_json::json!({"id": i})).collect(),
        };
        let (data, truncated) = t.shape_payload(payload, 1000);
        assert!(!truncated);
        assert_eq!(data["total_rows"], 250);
        assert_eq!(data["sample_rows"].as_array().unwrap().len(), SAMPLE_ROWS);
        assert!(data["summary"].as_str().unwrap().contains("250 rows"));
    }

    #[test]
    fn limit_truncates_rows() {
        let t = tool();
        let payload = QueryPayload {
            columns: vec!["id".to_string()],
            rows: (0..50).map(|i| serde_json::json!({"id": i})).collect(),
        };
        let (data, truncated) = t.shape_payload(payload, 20);
        assert!(truncated);
        assert_eq!(data["rows"].as_array().unwrap().len(), 20);
        assert_eq!(data["total_available"], 50);
    }

    #[tokio::test]
    async fn unreachable_gateway_yields_error_result() {
        let t = tool();
        let ctx = RequestContext::new();
        let result = t
            .execute(serde_json::json!({"query": "SELECT 1"}), &ctx)
            .await;
        assert_eq!(result.status, crate::tools::ResultStatus::Error);
        assert!(result.error.as_deref().unwrap_or_default().len() > 1);
        assert!(result.execution_time.is_some());
    }

    #[tokio::test]
    async fn missing_query_parameter_is_an_error_result() {
        let t = tool();
        let ctx = RequestContext::new();
        let result = t.execute(serde_json::json!({}), &ctx).await;
        assert_eq!(result.status, crate::tools::ResultStatus::Error);
    }
}
