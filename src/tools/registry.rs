//! Central registry for tool instances and their lifecycles.
//!
//! Tools are registered explicitly at startup via [`RegistryBuilder`] — the
//! composition root hands the registry concrete instances, there is no runtime
//! discovery. Each tool moves through
//! `discovered → initialized → (enabled | disabled) → cleaned_up`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::context::RequestContext;
use crate::tools::Tool;

/// Lifecycle phase of a registered tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolPhase {
    /// Registered but not yet initialized.
    Discovered,
    /// `initialize()` succeeded.
    Initialized,
    /// Available for selection and execution.
    Enabled,
    /// Registered but excluded from selection (config or failed init).
    Disabled,
    /// `cleanup()` has run.
    CleanedUp,
}

struct Registered {
    tool: Arc<dyn Tool>,
    phase: ToolPhase,
}

struct RegistryState {
    /// Tools in registration order; order breaks confidence ties.
    tools: Vec<Registered>,
    /// Name → index into `tools`.
    index: HashMap<String, usize>,
    initialized: bool,
}

/// Registry owning every tool instance in the process.
pub struct ToolRegistry {
    state: RwLock<RegistryState>,
}

/// Summary of a registered tool, for listings and the HTTP surface.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub phase: ToolPhase,
    pub use_cases: Vec<String>,
    pub data_sources: Vec<String>,
    pub prerequisites: Vec<String>,
}

impl ToolRegistry {
    fn from_tools(tools: Vec<Arc<dyn Tool>>) -> Self {
        let mut index = HashMap::new();
        let mut registered = Vec::with_capacity(tools.len());

        for tool in tools {
            let name = tool.capability().name.clone();
            if let Some(&existing) = index.get(&name) {
                tracing::warn!(tool = %name, "tool already registered, replacing");
                let slot: &mut Registered = &mut registered[existing];
                slot.tool = tool;
                continue;
            }
            index.insert(name, registered.len());
            registered.push(Registered {
                tool,
                phase: ToolPhase::Discovered,
            });
        }

        Self {
            state: RwLock::new(RegistryState {
                tools: registered,
                index,
                initialized: false,
            }),
        }
    }

    /// Initialize every registered tool. Idempotent: a second call is a no-op.
    ///
    /// A single tool failing to initialize is logged and leaves that tool
    /// disabled; it never fails the registry as a whole.
    pub async fn initialize(&self) {
        let mut state = self.state.write().await;
        if state.initialized {
            return;
        }

        for entry in &mut state.tools {
            let name = entry.tool.capability().name.clone();
            if !entry.tool.enabled() {
                tracing::info!(tool = %name, "tool disabled by configuration");
                entry.phase = ToolPhase::Disabled;
                continue;
            }
            if entry.tool.initialize().await {
                entry.phase = ToolPhase::Enabled;
                tracing::info!(tool = %name, "tool initialized");
            } else {
                entry.phase = ToolPhase::Disabled;
                tracing::warn!(tool = %name, "tool failed to initialize, leaving disabled");
            }
        }

        state.initialized = true;
        let total = state.tools.len();
        let enabled = state
            .tools
            .iter()
            .filter(|t| t.phase == ToolPhase::Enabled)
            .count();
        tracing::info!(total, enabled, "tool registry initialized");
    }

    /// Look up a tool by name.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let state = self.state.read().await;
        state
            .index
            .get(name)
            .map(|&i| Arc::clone(&state.tools[i].tool))
    }

    /// All tools currently in the `Enabled` phase, in registration order.
    pub async fn enabled_tools(&self) -> Vec<Arc<dyn Tool>> {
        let state = self.state.read().await;
        state
            .tools
            .iter()
            .filter(|t| t.phase == ToolPhase::Enabled)
            .map(|t| Arc::clone(&t.tool))
            .collect()
    }

    /// Enabled tools scoring at or above `min_confidence` for the intent,
    /// sorted by descending confidence. Ties keep registration order.
    pub async fn tools_for_intent(
        &self,
        intent: &str,
        context: &RequestContext,
        min_confidence: f64,
    ) -> Vec<(Arc<dyn Tool>, f64)> {
        let mut scored: Vec<(Arc<dyn Tool>, f64)> = self
            .enabled_tools()
            .await
            .into_iter()
            .filter_map(|tool| {
                let confidence = tool.applicability(intent, context);
                (confidence >= min_confidence).then_some((tool, confidence))
            })
            .collect();

        // Stable sort keeps registration order on ties.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }

    /// Listing of every registered tool with its lifecycle phase.
    pub async fn list(&self) -> Vec<ToolInfo> {
        let state = self.state.read().await;
        state
            .tools
            .iter()
            .map(|entry| {
                let cap = entry.tool.capability();
                ToolInfo {
                    name: cap.name.clone(),
                    description: cap.description.clone(),
                    phase: entry.phase,
                    use_cases: cap.use_cases.clone(),
                    data_sources: cap.data_sources.clone(),
                    prerequisites: cap.prerequisites.clone(),
                }
            })
            .collect()
    }

    /// Number of registered tools.
    pub async fn len(&self) -> usize {
        self.state.read().await.tools.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.tools.is_empty()
    }

    /// Clean up every tool and clear the registry.
    ///
    /// Safe to call without `initialize`, and safe to call twice: tools
    /// already cleaned up (or never present) are skipped.
    pub async fn cleanup(&self) {
        let mut state = self.state.write().await;

        for entry in &mut state.tools {
            if entry.phase == ToolPhase::CleanedUp {
                continue;
            }
            entry.tool.cleanup().await;
            entry.phase = ToolPhase::CleanedUp;
        }

        state.tools.clear();
        state.index.clear();
        state.initialized = false;
        tracing::info!("tool registry cleaned up");
    }
}

/// Builder the composition root uses to hand the registry its tools.
#[derive(Default)]
pub struct RegistryBuilder {
    tools: Vec<Arc<dyn Tool>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry::from_tools(self.tools)
    }
}
