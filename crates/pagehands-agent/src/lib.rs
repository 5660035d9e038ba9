//! The agent loop.
//!
//! Drives a bounded tool-use dialogue against the model: the full per-tab
//! history is replayed each call, tool_use blocks are dispatched strictly
//! in order, and the tool_result batch is appended as a single user
//! message before the next call. A cancellation token is observed before
//! each turn, before each tool dispatch, and inside the provider
//! transport.

pub mod bridge;
pub mod catalog;
pub mod dispatch;
pub mod events;
pub mod prompts;
pub mod provider;
pub mod run;

pub use bridge::ToolBridge;
pub use events::{AgentEvents, NullEvents};
pub use run::{AgentConfig, AgentLoop, TurnContext, MAX_TURNS};
