//! Tool system: capability metadata, the tool contract, confidence scoring,
//! and the registry that owns tool lifecycles.

pub mod builtin;
pub mod scoring;

mod capability;
mod registry;
mod tool;

pub use capability::{
    Capability, ParamSpec, ParamType, ResultStatus, ToolAction, ToolResult, now_iso,
};
pub use registry::{RegistryBuilder, ToolInfo, ToolPhase, ToolRegistry};
pub use tool::{Tool, ToolError, opt_usize, require_str, validate_against_capability};
