//! Test doubles for the orchestration engine.
//!
//! Provides:
//! - [`ScriptedLlm`]: a backend that replays a fixed sequence of replies
//! - [`StubTool`]: a configurable tool with scripted payloads and failures
//!
//! Used by the unit tests in this crate and by the integration suite; not
//! intended for production wiring.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::context::RequestContext;
use crate::error::LlmError;
use crate::llm::{CompletionRequest, LlmBackend};
use crate::tools::{Capability, ParamSpec, ParamType, Tool, ToolResult};

/// What the scripted backend does once its script runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExhaustedBehavior {
    /// Keep returning the final scripted reply.
    RepeatLast,
    /// Fail every further call with a transient error.
    Fail,
}

/// Backend that replays scripted replies in order.
///
/// Once the script is exhausted, the last reply repeats (or every further
/// call fails, with [`then_fail`](Self::then_fail)). With an empty script
/// every call fails, which exercises the deterministic fallback paths.
pub struct ScriptedLlm {
    replies: Mutex<Vec<String>>,
    call_count: AtomicU32,
    should_fail: AtomicBool,
    exhausted: ExhaustedBehavior,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
            call_count: AtomicU32::new(0),
            should_fail: AtomicBool::new(false),
            exhausted: ExhaustedBehavior::RepeatLast,
        }
    }

    /// A backend that always returns the same reply.
    pub fn always(reply: &str) -> Self {
        Self::new(vec![reply])
    }

    /// A backend whose every call fails with a transient error.
    pub fn failing() -> Self {
        let llm = Self::new(vec![]);
        llm.should_fail.store(true, Ordering::Relaxed);
        llm
    }

    /// Fail every call made after the script is exhausted.
    pub fn then_fail(mut self) -> Self {
        self.exhausted = ExhaustedBehavior::Fail;
        self
    }

    /// Number of completions requested so far.
    pub fn calls(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Toggle failure mode at runtime.
    pub fn set_failing(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::Relaxed);
    }

    fn transient_error() -> LlmError {
        LlmError::RequestFailed {
            provider: "scripted".to_string(),
            reason: "scripted failure".to_string(),
        }
    }
}

#[async_trait]
impl LlmBackend for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if self.should_fail.load(Ordering::Relaxed) {
            return Err(Self::transient_error());
        }

        let mut replies = self.replies.lock().await;
        match (replies.len(), self.exhausted) {
            (0, _) => Err(Self::transient_error()),
            (1, ExhaustedBehavior::RepeatLast) => Ok(replies[0].clone()),
            _ => Ok(replies.remove(0)),
        }
    }
}

/// Configurable stub tool.
pub struct StubTool {
    capability: Capability,
    enabled: bool,
    init_ok: bool,
    fail_execute: AtomicBool,
    payload: serde_json::Value,
    executions: AtomicU32,
    cleanups: AtomicU32,
}

impl StubTool {
    /// Create a stub with the given name and use-case phrases.
    pub fn new(name: &str, use_cases: &[&str]) -> Self {
        let capability = Capability::new(name, format!("{} stub tool", name))
            .with_parameter("query", ParamSpec::new(ParamType::String, "Query text"))
            .with_use_cases(use_cases);

        Self {
            capability,
            enabled: true,
            init_ok: true,
            fail_execute: AtomicBool::new(false),
            payload: serde_json::json!({"stub": true}),
            executions: AtomicU32::new(0),
            cleanups: AtomicU32::new(0),
        }
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.capability = self.capability.with_confidence_keywords(keywords);
        self
    }

    pub fn with_prerequisites(mut self, prerequisites: &[&str]) -> Self {
        self.capability = self.capability.with_prerequisites(prerequisites);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Make the capability require a `query` string parameter.
    pub fn with_required_query(mut self) -> Self {
        self.capability = self.capability.with_parameter(
            "query",
            ParamSpec::new(ParamType::String, "Query text").required(),
        );
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.init_ok = false;
        self
    }

    pub fn failing_execute(self) -> Self {
        self.fail_execute.store(true, Ordering::Relaxed);
        self
    }

    pub fn executions(&self) -> u32 {
        self.executions.load(Ordering::Relaxed)
    }

    pub fn cleanups(&self) -> u32 {
        self.cleanups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Tool for StubTool {
    fn capability(&self) -> &Capability {
        &self.capability
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn execute(&self, params: serde_json::Value, _ctx: &RequestContext) -> ToolResult {
        self.executions.fetch_add(1, Ordering::Relaxed);
        if self.fail_execute.load(Ordering::Relaxed) {
            return ToolResult::error(&self.capability.name, "stub execution failure");
        }
        let mut data = self.payload.clone();
        if let (Some(map), Some(query)) =
            (data.as_object_mut(), params.get("query").and_then(|v| v.as_str()))
        {
            map.insert("echo_query".to_string(), serde_json::json!(query));
        }
        ToolResult::success(&self.capability.name, data)
    }

    async fn initialize(&self) -> bool {
        self.init_ok
    }

    async fn cleanup(&self) {
        self.cleanups.fetch_add(1, Ordering::Relaxed);
    }
}

/// Serialize a planner reply for `ScriptedLlm` scripts.
pub fn plan_reply(actions: &[(&str, serde_json::Value, i32)]) -> String {
    let actions: Vec<serde_json::Value> = actions
        .iter()
        .map(|(name, params, priority)| {
            serde_json::json!({
                "tool_name": name,
                "parameters": params,
                "priority": priority,
                "reasoning": "scripted",
            })
        })
        .collect();
    serde_json::to_string(&actions).expect("actions serialize")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_llm_replays_then_repeats() {
        let llm = ScriptedLlm::new(vec!["first", "second"]);
        let req = || CompletionRequest::new("sys", "prompt");

        assert_eq!(llm.complete(req()).await.unwrap(), "first");
        assert_eq!(llm.complete(req()).await.unwrap(), "second");
        assert_eq!(llm.complete(req()).await.unwrap(), "second");
        assert_eq!(llm.calls(), 3);
    }

    #[tokio::test]
    async fn failing_llm_errors() {
        let llm = ScriptedLlm::failing();
        let result = llm.complete(CompletionRequest::new("s", "p")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn stub_tool_echoes_query() {
        let tool = StubTool::new("echoer", &["echo"]);
        let ctx = RequestContext::new();
        let result = tool
            .execute(serde_json::json!({"query": "ping"}), &ctx)
            .await;
        assert!(result.is_success());
        assert_eq!(result.data.unwrap()["echo_query"], "ping");
        assert_eq!(tool.executions(), 1);
    }
}
