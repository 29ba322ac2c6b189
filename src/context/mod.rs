//! Request context construction and per-session state.

pub mod entities;

mod manager;
mod request;
mod session;

pub use manager::ContextManager;
pub use request::RequestContext;
pub use session::{HistoryEntry, Preferences, ResultDigest, SessionState, RECENT_TOOLS_CAP};
