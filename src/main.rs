//! Switchboard — main entry point.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use switchboard::agent::{Agent, AgentRequest};
use switchboard::config::Config;
use switchboard::context::ContextManager;
use switchboard::llm::OpenAiChatBackend;
use switchboard::server;
use switchboard::tools::RegistryBuilder;
use switchboard::tools::builtin::{WarehouseClient, register_builtin_tools};

#[derive(Parser)]
#[command(name = "switchboard", version, about = "Intent-routing tool orchestration agent")]
struct Cli {
    /// Process a single request and print the response instead of serving.
    #[arg(short, long)]
    message: Option<String>,

    /// Session id to use for one-shot messages.
    #[arg(long, default_value = "cli")]
    session: String,

    /// User id to attach to one-shot messages.
    #[arg(long)]
    user: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API server (default).
    Serve,
    /// List registered tools and their lifecycle state.
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("switchboard=info")),
        )
        .init();

    let config = Config::from_env()?;

    let warehouse_client = Arc::new(WarehouseClient::new(config.tools.warehouse.clone()));
    let registry = Arc::new(
        register_builtin_tools(
            RegistryBuilder::new(),
            &config.tools,
            Arc::clone(&warehouse_client),
        )
        .build(),
    );
    registry.initialize().await;

    if let Some(Command::Tools) = cli.command {
        for info in registry.list().await {
            println!("{:<20} {:?}  {}", info.name, info.phase, info.description);
        }
        registry.cleanup().await;
        return Ok(());
    }

    let llm = Arc::new(OpenAiChatBackend::new(config.llm.clone())?);
    let context_manager = Arc::new(ContextManager::new(config.agent.max_history));
    let agent = Arc::new(Agent::new(
        llm,
        Arc::clone(&registry),
        context_manager,
        config.agent.clone(),
    ));

    if let Some(message) = cli.message {
        let mut request = AgentRequest::new(message).with_session(cli.session);
        if let Some(user) = cli.user {
            request = request.with_user(user);
        }

        let response = agent.process_request(request).await;
        println!("{}", response.response);
        if !response.tool_results.is_empty() {
            eprintln!(
                "[{} tool results, status: {:?}]",
                response.tool_results.len(),
                response.status
            );
        }

        registry.cleanup().await;
        return Ok(());
    }

    let result = server::serve(&config.server, agent, Arc::clone(&registry)).await;
    registry.cleanup().await;
    result?;
    Ok(())
}
