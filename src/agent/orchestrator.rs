//! The iterative orchestration loop.
//!
//! A request flows through: conversational check → up to `max_iterations`
//! rounds of plan/execute/sufficiency → final synthesis (or a conversational
//! fallback when no tool ever produced a result). Recoverable failures are
//! absorbed at the lowest layer — tool errors become error results, planner
//! parse failures fall back to a deterministic action list, sufficiency-check
//! failures default to a heuristic — so the loop itself only fails on truly
//! unexpected conditions.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::prompts;
use crate::agent::selector::ToolSelector;
use crate::config::AgentConfig;
use crate::context::{ContextManager, RequestContext};
use crate::error::Error;
use crate::llm::{CompletionRequest, LlmBackend};
use crate::tools::{Tool, ToolAction, ToolRegistry, ToolResult};

/// Phrases that short-circuit to a conversational reply.
const CONVERSATIONAL_PHRASES: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "what model are you",
    "who are you",
    "what are you",
    "how are you",
    "what can you do",
    "what do you do",
    "help",
    "thank you",
    "thanks",
    "bye",
    "goodbye",
    "what's your name",
    "introduce yourself",
    "tell me about yourself",
    "what are your capabilities",
    "how do you work",
];

/// Keywords that mark a short request as data-oriented anyway.
const DATA_KEYWORDS: &[&str] = &[
    "table",
    "data",
    "query",
    "search",
    "find",
    "show",
    "get",
    "list",
    "database",
    "warehouse",
];

/// Terminal status of a processed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Handled without tools.
    Conversational,
    /// Tool path selected but no tool ever produced a result.
    ConversationalFallback,
    /// Tool results synthesized into a final answer.
    Success,
    /// Unrecoverable orchestration failure.
    Error,
}

/// Inbound request record.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentRequest {
    pub user_request: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub additional_context: Option<serde_json::Map<String, serde_json::Value>>,
}

impl AgentRequest {
    pub fn new(user_request: impl Into<String>) -> Self {
        Self {
            user_request: user_request.into(),
            user_id: None,
            session_id: None,
            additional_context: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Outbound response record.
#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    pub response: String,
    pub status: RequestStatus,
    pub tool_results: Vec<ToolResult>,
    pub tool_actions: Vec<ToolAction>,
    pub context: RequestContext,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResponse {
    fn new(response: String, status: RequestStatus, context: RequestContext) -> Self {
        Self {
            response,
            status,
            tool_results: Vec::new(),
            tool_actions: Vec::new(),
            context,
            timestamp: Utc::now(),
            error: None,
        }
    }
}

/// Shape of one planned action in the backend's JSON reply.
#[derive(Debug, Deserialize)]
struct PlannedAction {
    tool_name: String,
    #[serde(default)]
    parameters: serde_json::Value,
    #[serde(default = "default_priority")]
    priority: i32,
    #[serde(default)]
    #[allow(dead_code)]
    reasoning: Option<String>,
}

fn default_priority() -> i32 {
    1
}

/// The orchestrating agent.
pub struct Agent {
    llm: Arc<dyn LlmBackend>,
    registry: Arc<ToolRegistry>,
    selector: ToolSelector,
    context_manager: Arc<ContextManager>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(
        llm: Arc<dyn LlmBackend>,
        registry: Arc<ToolRegistry>,
        context_manager: Arc<ContextManager>,
        config: AgentConfig,
    ) -> Self {
        let selector = ToolSelector::new(Arc::clone(&registry), config.min_confidence);
        Self {
            llm,
            registry,
            selector,
            context_manager,
            config,
        }
    }

    pub fn selector(&self) -> &ToolSelector {
        &self.selector
    }

    pub fn context_manager(&self) -> &ContextManager {
        &self.context_manager
    }

    /// Process one user request end to end.
    ///
    /// Never returns an error: any uncaught failure inside the loop is
    /// surfaced as an `error`-status response with the request context
    /// attached for diagnostics.
    pub async fn process_request(&self, request: AgentRequest) -> AgentResponse {
        tracing::info!(request = %request.user_request, "processing request");

        let context = self
            .context_manager
            .build_context(
                &request.user_request,
                request.user_id.as_deref(),
                request.session_id.as_deref(),
                request.additional_context.clone(),
            )
            .await;

        match self.run(&request.user_request, context.clone()).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "error processing request");
                let mut response = AgentResponse::new(
                    format!(
                        "I encountered an error while processing your request: {}",
                        e
                    ),
                    RequestStatus::Error,
                    context,
                );
                response.error = Some(e.to_string());
                response
            }
        }
    }

    async fn run(
        &self,
        user_request: &str,
        context: RequestContext,
    ) -> Result<AgentResponse, Error> {
        if is_conversational_request(user_request) {
            let reply = self.conversational_reply(user_request).await;
            return Ok(AgentResponse::new(
                reply,
                RequestStatus::Conversational,
                context,
            ));
        }

        let mut all_results: Vec<ToolResult> = Vec::new();
        let mut all_actions: Vec<ToolAction> = Vec::new();

        for iteration in 1..=self.config.max_iterations {
            tracing::info!(iteration, "tool execution iteration");

            // Iteration-scoped view: compact summaries of prior results only,
            // to bound prompt size.
            let mut iteration_context = context.clone();
            iteration_context.insert("previous_results", result_digests(&all_results));

            let actions = self.plan_actions(user_request, &iteration_context).await?;
            if actions.is_empty() {
                break;
            }

            let results = self
                .execute_actions(&actions, &mut iteration_context)
                .await;

            all_results.extend(results.iter().cloned());
            all_actions.extend(actions);

            if self
                .has_sufficient_information(user_request, &all_results)
                .await
            {
                break;
            }

            self.context_manager.update_context(&context, &results).await;
        }

        if all_results.is_empty() {
            let reply = self.conversational_reply(user_request).await;
            return Ok(AgentResponse::new(
                reply,
                RequestStatus::ConversationalFallback,
                context,
            ));
        }

        let final_response = self
            .synthesize_response(user_request, &all_results, &context)
            .await?;

        self.context_manager
            .update_context(&context, &all_results)
            .await;

        let mut response = AgentResponse::new(final_response, RequestStatus::Success, context);
        response.tool_results = all_results;
        response.tool_actions = all_actions;
        Ok(response)
    }

    /// Ask the backend to turn the ranked candidate list into concrete
    /// actions. Any parse failure falls back to a deterministic action list.
    async fn plan_actions(
        &self,
        user_request: &str,
        context: &RequestContext,
    ) -> Result<Vec<ToolAction>, Error> {
        let recommended = self.selector.select_tools(user_request, context).await;
        if recommended.is_empty() {
            let suggestions = self
                .selector
                .suggest_additional_tools(user_request, context)
                .await;
            if !suggestions.is_empty() {
                tracing::debug!(?suggestions, "near-miss tools below confidence threshold");
            }
            return Ok(Vec::new());
        }

        let tools_info: Vec<serde_json::Value> = recommended
            .iter()
            .map(|(tool, confidence)| {
                let cap = tool.capability();
                serde_json::json!({
                    "name": cap.name,
                    "description": cap.description,
                    "parameters": cap.parameters_schema(),
                    "confidence": confidence,
                })
            })
            .collect();

        let prompt = prompts::plan_prompt(
            user_request,
            &serde_json::to_string_pretty(&tools_info)?,
            &serde_json::to_string_pretty(&context.to_value())?,
        );

        let reply = self
            .llm
            .complete(CompletionRequest::new(prompts::SYSTEM_PROMPT, prompt))
            .await;

        match reply {
            Ok(text) => match extract_action_array(&text) {
                Some(planned) => Ok(planned
                    .into_iter()
                    .map(|p| ToolAction::new(p.tool_name, p.parameters, p.priority))
                    .collect()),
                None => {
                    tracing::warn!("planner reply contained no parseable action array, using fallback");
                    Ok(fallback_actions(user_request, context, &recommended))
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "planner call failed, using fallback actions");
                Ok(fallback_actions(user_request, context, &recommended))
            }
        }
    }

    /// Execute one iteration's actions sequentially in priority order.
    ///
    /// Later actions can read earlier outputs via `tool_result_<name>` keys in
    /// the iteration context. Unknown tools are skipped with a warning; any
    /// validation or execution failure becomes an error-status result.
    async fn execute_actions(
        &self,
        actions: &[ToolAction],
        context: &mut RequestContext,
    ) -> Vec<ToolResult> {
        let mut ordered: Vec<&ToolAction> = actions.iter().collect();
        ordered.sort_by_key(|a| a.priority);

        let mut results = Vec::with_capacity(ordered.len());

        for action in ordered {
            let Some(tool) = self.registry.get(&action.tool_name).await else {
                tracing::warn!(tool = %action.tool_name, "tool not found in registry, skipping action");
                continue;
            };

            let result = self.execute_one(tool, action, context).await;
            context.insert(
                format!("tool_result_{}", action.tool_name),
                result.data.clone().unwrap_or(serde_json::Value::Null),
            );
            results.push(result);
        }

        results
    }

    async fn execute_one(
        &self,
        tool: Arc<dyn Tool>,
        action: &ToolAction,
        context: &RequestContext,
    ) -> ToolResult {
        let started = Instant::now();

        let validated = match tool.validate_parameters(&action.parameters) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(tool = %action.tool_name, error = %e, "parameter validation failed");
                return ToolResult::error(&action.tool_name, e.to_string())
                    .with_execution_time(started.elapsed());
            }
        };

        tracing::info!(tool = %action.tool_name, "executing tool");
        let mut result = tool.execute(validated, context).await;
        if result.execution_time.is_none() {
            result = result.with_execution_time(started.elapsed());
        }
        result
    }

    /// Judge whether enough information has been gathered.
    ///
    /// False whenever there is no successful result, regardless of the
    /// backend. On a backend failure the check defaults to "sufficient" iff
    /// at least one result succeeded.
    async fn has_sufficient_information(
        &self,
        user_request: &str,
        results: &[ToolResult],
    ) -> bool {
        if results.is_empty() {
            return false;
        }

        let successful: Vec<&ToolResult> = results.iter().filter(|r| r.is_success()).collect();
        if successful.is_empty() {
            return false;
        }

        let summaries: Vec<serde_json::Value> = successful
            .iter()
            .map(|r| {
                serde_json::json!({
                    "tool": r.tool_name,
                    "status": "success",
                    "data_available": r.has_data(),
                })
            })
            .collect();

        let prompt = prompts::sufficiency_prompt(
            user_request,
            &serde_json::to_string_pretty(&summaries).unwrap_or_else(|_| "[]".to_string()),
        );

        match self
            .llm
            .complete(
                CompletionRequest::new(prompts::SUFFICIENCY_SYSTEM_PROMPT, prompt)
                    .with_max_tokens(10)
                    .with_temperature(0.1),
            )
            .await
        {
            Ok(answer) => answer.trim().to_uppercase().starts_with("YES"),
            Err(e) => {
                tracing::warn!(error = %e, "sufficiency check failed, defaulting on successful results");
                !successful.is_empty()
            }
        }
    }

    async fn synthesize_response(
        &self,
        user_request: &str,
        results: &[ToolResult],
        context: &RequestContext,
    ) -> Result<String, Error> {
        let summaries: Vec<serde_json::Value> = results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "tool": r.tool_name,
                    "status": r.status.to_string(),
                    "data": if r.is_success() { r.data.clone() } else { None },
                    "error": r.error.clone(),
                })
            })
            .collect();

        let prompt = prompts::synthesis_prompt(
            user_request,
            &serde_json::to_string_pretty(&summaries)?,
            &serde_json::to_string_pretty(&context.to_value())?,
        );

        match self
            .llm
            .complete(CompletionRequest::new(prompts::SYSTEM_PROMPT, prompt))
            .await
        {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::error!(error = %e, "final synthesis failed");
                Ok(format!(
                    "I processed your request using {} tools, but encountered an error \
                     generating the final response. The tools executed and gathered the \
                     requested information.",
                    results.len()
                ))
            }
        }
    }

    async fn conversational_reply(&self, user_request: &str) -> String {
        match self
            .llm
            .complete(
                CompletionRequest::new(
                    prompts::CONVERSATIONAL_SYSTEM_PROMPT,
                    prompts::conversational_prompt(user_request),
                )
                .with_max_tokens(500)
                .with_temperature(0.3),
            )
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "conversational reply failed");
                prompts::CONVERSATIONAL_FALLBACK_REPLY.to_string()
            }
        }
    }
}

/// Whether a request should skip tooling entirely.
///
/// Single-word phrases match on word boundaries (so "history" does not match
/// "hi"); multi-word phrases match as substrings. Very short requests without
/// any data-oriented keyword are treated as conversational too.
pub fn is_conversational_request(user_request: &str) -> bool {
    let request_lower = user_request.to_lowercase();
    let words: Vec<&str> = request_lower
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\''))
        .collect();

    for phrase in CONVERSATIONAL_PHRASES {
        let matched = if phrase.contains(' ') {
            request_lower.contains(phrase)
        } else {
            words.iter().any(|w| w == phrase)
        };
        if matched {
            return true;
        }
    }

    words.len() <= 3
        && !DATA_KEYWORDS
            .iter()
            .any(|kw| request_lower.contains(kw))
}

/// Compact digests of prior results for the iteration context.
fn result_digests(results: &[ToolResult]) -> serde_json::Value {
    serde_json::Value::Array(
        results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "tool": r.tool_name,
                    "status": r.status.to_string(),
                    "has_data": r.has_data(),
                })
            })
            .collect(),
    )
}

/// Deterministic fallback: one simple action per top-ranked tool (up to 3),
/// parameterized from context plus the raw request text.
fn fallback_actions(
    user_request: &str,
    context: &RequestContext,
    recommended: &[(Arc<dyn Tool>, f64)],
) -> Vec<ToolAction> {
    recommended
        .iter()
        .take(3)
        .enumerate()
        .map(|(i, (tool, _))| {
            let mut params = serde_json::Map::new();
            if let Some(user_id) = context.get_str("user_id") {
                params.insert("user_id".to_string(), serde_json::json!(user_id));
            }
            if let Some(date) = context.get_str("date") {
                params.insert("date".to_string(), serde_json::json!(date));
            }
            params.insert("query".to_string(), serde_json::json!(user_request));

            ToolAction::new(
                tool.capability().name.clone(),
                serde_json::Value::Object(params),
                (i + 1) as i32,
            )
        })
        .collect()
}

/// Extract the first bracket-delimited JSON array of actions from free text.
///
/// Scans for `[`, finds the matching `]` (string- and escape-aware), and
/// tries to deserialize the slice. Moves on to the next candidate on failure;
/// returns `None` when nothing parses.
fn extract_action_array(text: &str) -> Option<Vec<PlannedAction>> {
    let bytes = text.as_bytes();
    let mut start = 0;

    while let Some(open_rel) = text[start..].find('[') {
        let open = start + open_rel;
        if let Some(close) = matching_bracket(bytes, open) {
            let candidate = &text[open..=close];
            match serde_json::from_str::<Vec<PlannedAction>>(candidate) {
                Ok(actions) => return Some(actions),
                Err(_) => {
                    start = open + 1;
                    continue;
                }
            }
        } else {
            return None;
        }
    }
    None
}

/// Index of the `]` matching the `[` at `open`, honoring JSON strings.
fn matching_bracket(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
