//! Builtin tool integrations.
//!
//! Each tool implements the [`Tool`](crate::tools::Tool) contract with its own
//! capability record. The composition root decides which of these to hand the
//! registry, gated by per-tool configuration.

mod documents;
mod knowledge;
mod messaging;
mod summary;
mod transform;
mod warehouse;

use std::sync::Arc;

pub use documents::DocumentSearchTool;
pub use knowledge::KnowledgeSearchTool;
pub use messaging::SendMessageTool;
pub use summary::SummarizerTool;
pub use transform::DataTransformTool;
pub use warehouse::{QueryPayload, WarehouseClient, WarehouseQueryTool};

use crate::config::ToolsConfig;
use crate::tools::RegistryBuilder;

/// Register the full builtin tool set onto a registry builder.
///
/// The warehouse client handle is owned by the caller so it can be shared or
/// probed independently of the registry.
pub fn register_builtin_tools(
    builder: RegistryBuilder,
    config: &ToolsConfig,
    warehouse_client: Arc<WarehouseClient>,
) -> RegistryBuilder {
    builder
        .with_tool(Arc::new(WarehouseQueryTool::new(
            warehouse_client,
            &config.warehouse,
        )))
        .with_tool(Arc::new(DocumentSearchTool::new(config.documents.clone())))
        .with_tool(Arc::new(KnowledgeSearchTool::new(config.knowledge.clone())))
        .with_tool(Arc::new(SendMessageTool::new(config.messaging.clone())))
        .with_tool(Arc::new(DataTransformTool::new()))
        .with_tool(Arc::new(SummarizerTool::new()))
}
