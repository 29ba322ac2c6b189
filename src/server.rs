//! HTTP API surface.
//!
//! Thin transport layer over the agent: everything interesting happens in
//! `agent::Agent::process_request`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;

use crate::agent::{Agent, AgentRequest};
use crate::config::ServerConfig;
use crate::error::Error;
use crate::tools::ToolRegistry;

#[derive(Clone)]
struct AppState {
    agent: Arc<Agent>,
    registry: Arc<ToolRegistry>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn tools_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.list().await)
}

async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<AgentRequest>,
) -> impl IntoResponse {
    if request.user_request.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "user_request must not be empty"})),
        );
    }

    let response = state.agent.process_request(request).await;
    let body = serde_json::to_value(&response)
        .unwrap_or_else(|e| serde_json::json!({"error": format!("serialization failed: {}", e)}));
    (StatusCode::OK, Json(body))
}

/// Build the API router.
pub fn router(agent: Arc<Agent>, registry: Arc<ToolRegistry>) -> Router {
    let state = AppState { agent, registry };
    Router::new()
        .route("/health", get(health_handler))
        .route("/tools", get(tools_handler))
        .route("/query", post(query_handler))
        .with_state(state)
}

/// Serve the API until the process is stopped.
pub async fn serve(
    config: &ServerConfig,
    agent: Arc<Agent>,
    registry: Arc<ToolRegistry>,
) -> Result<(), Error> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Server(format!("failed to bind {}: {}", addr, e)))?;

    tracing::info!(addr = %addr, "API listening");
    axum::serve(listener, router(agent, registry))
        .await
        .map_err(|e| Error::Server(e.to_string()))
}
