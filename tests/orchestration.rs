//! End-to-end orchestration tests with a scripted backend and stub tools.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use switchboard::agent::{Agent, AgentRequest, RequestStatus};
use switchboard::config::AgentConfig;
use switchboard::context::ContextManager;
use switchboard::testing::{ScriptedLlm, StubTool, plan_reply};
use switchboard::tools::{RegistryBuilder, ResultStatus, ToolRegistry};

async fn registry_with(tools: Vec<Arc<StubTool>>) -> Arc<ToolRegistry> {
    let mut builder = RegistryBuilder::new();
    for tool in tools {
        builder = builder.with_tool(tool);
    }
    let registry = Arc::new(builder.build());
    registry.initialize().await;
    registry
}

fn agent_with(llm: Arc<ScriptedLlm>, registry: Arc<ToolRegistry>) -> Agent {
    Agent::new(
        llm,
        registry,
        Arc::new(ContextManager::default()),
        AgentConfig::default(),
    )
}

#[tokio::test]
async fn greeting_short_circuits_to_conversational() {
    let llm = Arc::new(ScriptedLlm::always("Hi! How can I help?"));
    let tool = Arc::new(StubTool::new("warehouse_query", &["query data"]));
    let registry = registry_with(vec![Arc::clone(&tool)]).await;
    let agent = agent_with(Arc::clone(&llm), registry);

    let response = agent.process_request(AgentRequest::new("hello")).await;

    assert_eq!(response.status, RequestStatus::Conversational);
    assert!(response.tool_results.is_empty());
    assert!(response.tool_actions.is_empty());
    assert_eq!(response.response, "Hi! How can I help?");
    assert_eq!(tool.executions(), 0);
    // Exactly one backend call: the conversational reply.
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn conversational_reply_survives_backend_failure() {
    let llm = Arc::new(ScriptedLlm::failing());
    let registry = registry_with(vec![]).await;
    let agent = agent_with(llm, registry);

    let response = agent.process_request(AgentRequest::new("hello")).await;
    assert_eq!(response.status, RequestStatus::Conversational);
    assert!(response.response.contains("assist"));
}

#[tokio::test]
async fn no_selectable_tools_falls_back_to_conversational() {
    let llm = Arc::new(ScriptedLlm::always("Happy to help anyway."));
    let tool = Arc::new(StubTool::new("niche", &["completely unrelated phrase"]));
    let registry = registry_with(vec![tool]).await;
    let agent = agent_with(Arc::clone(&llm), registry);

    let response = agent
        .process_request(AgentRequest::new("show me the quarterly numbers"))
        .await;

    assert_eq!(response.status, RequestStatus::ConversationalFallback);
    assert!(response.tool_results.is_empty());
    // No planning call happened (selection was empty); only the fallback reply.
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn planned_actions_execute_and_synthesize() {
    let plan = plan_reply(&[(
        "fetcher",
        serde_json::json!({"query": "activity rows"}),
        1,
    )]);
    let llm = Arc::new(ScriptedLlm::new(vec![plan.as_str(), "YES", "Here is your answer."]));

    let tool = Arc::new(
        StubTool::new("fetcher", &["show data"]).with_payload(serde_json::json!({"rows": [1, 2]})),
    );
    let registry = registry_with(vec![Arc::clone(&tool)]).await;
    let agent = agent_with(Arc::clone(&llm), registry);

    let response = agent
        .process_request(AgentRequest::new("show data for the team").with_session("s-plan"))
        .await;

    assert_eq!(response.status, RequestStatus::Success);
    assert_eq!(response.response, "Here is your answer.");
    assert_eq!(response.tool_results.len(), 1);
    assert!(response.tool_results[0].is_success());
    assert_eq!(response.tool_actions.len(), 1);
    assert_eq!(tool.executions(), 1);
    // plan + sufficiency + synthesis.
    assert_eq!(llm.calls(), 3);

    // The session recorded the tool use.
    let session = agent.context_manager().session("s-plan").await.unwrap();
    assert_eq!(session.recent_tools, vec!["fetcher".to_string()]);
    assert_eq!(session.history.len(), 1);
}

#[tokio::test]
async fn actions_run_in_priority_order_and_see_prior_outputs() {
    let plan = plan_reply(&[
        ("third", serde_json::json!({"query": "c"}), 9),
        ("first", serde_json::json!({"query": "a"}), 1),
        ("second", serde_json::json!({"query": "b"}), 5),
    ]);
    let llm = Arc::new(ScriptedLlm::new(vec![plan.as_str(), "YES", "done"]));

    let tools = ["first", "second", "third"]
        .map(|name| Arc::new(StubTool::new(name, &["show data"])));
    let registry = registry_with(tools.iter().map(Arc::clone).collect()).await;
    let agent = agent_with(llm, registry);

    let response = agent
        .process_request(AgentRequest::new("show data please"))
        .await;

    let executed: Vec<&str> = response
        .tool_results
        .iter()
        .map(|r| r.tool_name.as_str())
        .collect();
    assert_eq!(executed, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn failing_tool_becomes_error_result_and_iteration_continues() {
    let plan = plan_reply(&[
        ("broken", serde_json::json!({"query": "x"}), 1),
        ("working", serde_json::json!({"query": "y"}), 2),
    ]);
    let llm = Arc::new(ScriptedLlm::new(vec![plan.as_str(), "YES", "partial answer"]));

    let broken = Arc::new(StubTool::new("broken", &["show data"]).failing_execute());
    let working = Arc::new(StubTool::new("working", &["show data"]));
    let registry = registry_with(vec![Arc::clone(&broken), Arc::clone(&working)]).await;
    let agent = agent_with(llm, registry);

    let response = agent
        .process_request(AgentRequest::new("show data for everyone"))
        .await;

    assert_eq!(response.status, RequestStatus::Success);
    assert_eq!(response.tool_results.len(), 2);

    let error_result = &response.tool_results[0];
    assert_eq!(error_result.status, ResultStatus::Error);
    assert!(!error_result.error.as_deref().unwrap_or_default().is_empty());

    // The sibling action still ran.
    assert_eq!(working.executions(), 1);
    assert!(response.tool_results[1].is_success());
}

#[tokio::test]
async fn unknown_tool_is_skipped_without_a_result() {
    let plan = plan_reply(&[
        ("ghost", serde_json::json!({}), 1),
        ("real", serde_json::json!({"query": "q"}), 2),
    ]);
    let llm = Arc::new(ScriptedLlm::new(vec![plan.as_str(), "YES", "done"]));

    let real = Arc::new(StubTool::new("real", &["show data"]));
    let registry = registry_with(vec![Arc::clone(&real)]).await;
    let agent = agent_with(llm, registry);

    let response = agent.process_request(AgentRequest::new("show data now")).await;

    // Only the known tool produced a result; the ghost was skipped silently.
    assert_eq!(response.tool_results.len(), 1);
    assert_eq!(response.tool_results[0].tool_name, "real");
    assert_eq!(response.status, RequestStatus::Success);
}

#[tokio::test]
async fn invalid_parameters_become_an_error_result() {
    let plan = plan_reply(&[("strict", serde_json::json!({}), 1)]);
    // Zero successes skip the sufficiency call; the second planning round
    // returns no actions, ending the loop with only the error result.
    let llm = Arc::new(ScriptedLlm::new(vec![plan.as_str(), "[]", "done"]));

    let strict = Arc::new(StubTool::new("strict", &["show data"]).with_required_query());
    let registry = registry_with(vec![Arc::clone(&strict)]).await;
    let agent = agent_with(llm, registry);

    let response = agent.process_request(AgentRequest::new("show data now")).await;

    assert_eq!(response.tool_results.len(), 1);
    assert_eq!(response.tool_results[0].status, ResultStatus::Error);
    assert!(
        response.tool_results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("query")
    );
    // Validation failed before the tool body ran.
    assert_eq!(strict.executions(), 0);
}

#[tokio::test]
async fn loop_stops_after_three_iterations() {
    let plan = plan_reply(&[("poller", serde_json::json!({"query": "more"}), 1)]);
    // Three rounds of plan + "NO", then the synthesis reply.
    let llm = Arc::new(ScriptedLlm::new(vec![
        plan.as_str(),
        "NO",
        plan.as_str(),
        "NO",
        plan.as_str(),
        "NO",
        "Final synthesis.",
    ]));

    let tool = Arc::new(StubTool::new("poller", &["show data"]));
    let registry = registry_with(vec![Arc::clone(&tool)]).await;
    let agent = agent_with(Arc::clone(&llm), registry);

    let response = agent
        .process_request(AgentRequest::new("show data endlessly"))
        .await;

    // No fourth iteration, and synthesis still happened.
    assert_eq!(tool.executions(), 3);
    assert_eq!(response.tool_results.len(), 3);
    assert_eq!(response.status, RequestStatus::Success);
    assert_eq!(response.response, "Final synthesis.");
    assert_eq!(llm.calls(), 7);
}

#[tokio::test]
async fn sufficiency_yes_stops_the_loop_early() {
    let plan = plan_reply(&[("fetcher", serde_json::json!({"query": "q"}), 1)]);
    let llm = Arc::new(ScriptedLlm::new(vec![plan.as_str(), "YES, that covers it", "done"]));

    let tool = Arc::new(StubTool::new("fetcher", &["show data"]));
    let registry = registry_with(vec![Arc::clone(&tool)]).await;
    let agent = agent_with(Arc::clone(&llm), registry);

    let response = agent.process_request(AgentRequest::new("show data once")).await;

    assert_eq!(tool.executions(), 1);
    assert_eq!(response.status, RequestStatus::Success);
}

#[tokio::test]
async fn zero_successes_skip_the_sufficiency_backend_call() {
    let plan = plan_reply(&[("broken", serde_json::json!({"query": "q"}), 1)]);
    // Script: three planning calls, then synthesis. A sufficiency call would
    // consume a script slot and shift the final reply.
    let llm = Arc::new(ScriptedLlm::new(vec![plan.as_str(), plan.as_str(), plan.as_str(), "synthesized"]));

    let broken = Arc::new(StubTool::new("broken", &["show data"]).failing_execute());
    let registry = registry_with(vec![Arc::clone(&broken)]).await;
    let agent = agent_with(Arc::clone(&llm), registry);

    let response = agent
        .process_request(AgentRequest::new("show data that fails"))
        .await;

    // Error results still count as results, so synthesis runs.
    assert_eq!(response.status, RequestStatus::Success);
    assert_eq!(response.response, "synthesized");
    assert_eq!(broken.executions(), 3);
    assert_eq!(llm.calls(), 4);
}

#[tokio::test]
async fn unparseable_plan_falls_back_to_deterministic_actions() {
    let llm = Arc::new(ScriptedLlm::new(vec![
        "I believe we should query some things, probably.",
        "YES",
        "fallback worked",
    ]));

    let tool = Arc::new(StubTool::new("fetcher", &["show data"]));
    let registry = registry_with(vec![Arc::clone(&tool)]).await;
    let agent = agent_with(llm, registry);

    let response = agent
        .process_request(
            AgentRequest::new("show data for 2026-05-01")
                .with_user("u-42")
                .with_session("s-fb"),
        )
        .await;

    assert_eq!(response.status, RequestStatus::Success);
    assert_eq!(tool.executions(), 1);
    assert_eq!(response.tool_actions.len(), 1);

    // Fallback parameters come from context plus the raw request.
    let params = &response.tool_actions[0].parameters;
    assert_eq!(params["user_id"], "u-42");
    assert_eq!(params["date"], "2026-05-01");
    assert_eq!(params["query"], "show data for 2026-05-01");
}

#[tokio::test]
async fn prerequisite_gated_tool_needs_the_context_key() {
    let gated = Arc::new(
        StubTool::new("gated", &["show data"]).with_prerequisites(&["date"]),
    );

    // Without a date anywhere: nothing selectable, conversational fallback.
    {
        let llm = Arc::new(ScriptedLlm::always("nothing to do"));
        let registry = registry_with(vec![Arc::clone(&gated)]).await;
        let agent = agent_with(Arc::clone(&llm), registry);

        let response = agent
            .process_request(AgentRequest::new("show data please"))
            .await;
        assert_eq!(response.status, RequestStatus::ConversationalFallback);
        assert_eq!(gated.executions(), 0);
    }

    // A date entity in the request satisfies the prerequisite.
    {
        let plan = plan_reply(&[("gated", serde_json::json!({"query": "q"}), 1)]);
        let llm = Arc::new(ScriptedLlm::new(vec![plan.as_str(), "YES", "done"]));
        let registry = registry_with(vec![Arc::clone(&gated)]).await;
        let agent = agent_with(llm, registry);

        let response = agent
            .process_request(AgentRequest::new("show data for yesterday"))
            .await;
        assert_eq!(response.status, RequestStatus::Success);
        assert_eq!(gated.executions(), 1);
    }
}

#[tokio::test]
async fn synthesis_failure_degrades_to_canned_summary() {
    let plan = plan_reply(&[("fetcher", serde_json::json!({"query": "q"}), 1)]);
    // Plan and sufficiency consume the script; the synthesis call then fails.
    let llm = Arc::new(ScriptedLlm::new(vec![plan.as_str(), "YES"]).then_fail());

    let tool = Arc::new(StubTool::new("fetcher", &["show data"]));
    let registry = registry_with(vec![tool]).await;
    let agent = agent_with(Arc::clone(&llm), registry);

    let response = agent.process_request(AgentRequest::new("show data once")).await;

    assert_eq!(response.status, RequestStatus::Success);
    assert!(response.response.contains("1 tools"));
    assert_eq!(llm.calls(), 3);
}

#[tokio::test]
async fn sufficiency_backend_failure_defaults_to_sufficient_on_success() {
    let plan = plan_reply(&[("fetcher", serde_json::json!({"query": "q"}), 1)]);
    // Only the plan is scripted: the sufficiency call fails, but a successful
    // result defaults the check to "sufficient", and synthesis fails too so
    // the canned summary is used. Exactly one iteration must run.
    let llm = Arc::new(ScriptedLlm::new(vec![plan.as_str()]).then_fail());

    let tool = Arc::new(StubTool::new("fetcher", &["show data"]));
    let registry = registry_with(vec![Arc::clone(&tool)]).await;
    let agent = agent_with(Arc::clone(&llm), registry);

    let response = agent.process_request(AgentRequest::new("show data once")).await;

    assert_eq!(tool.executions(), 1);
    assert_eq!(response.status, RequestStatus::Success);
    // plan + failed sufficiency + failed synthesis.
    assert_eq!(llm.calls(), 3);
}
