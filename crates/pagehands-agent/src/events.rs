//! Agent event sink.
//!
//! The loop narrates its progress through this trait; the fabric forwards
//! the events to the tab's UI port.

use async_trait::async_trait;
use serde_json::Value;

use pagehands_protocols::types::{Message, TabId, Todo};

#[async_trait]
pub trait AgentEvents: Send + Sync {
    /// A complete assistant message was appended to the history.
    async fn assistant_message(&self, tab_id: TabId, message: &Message);

    /// A tool call is about to be dispatched.
    async fn tool_call(&self, tab_id: TabId, id: &str, name: &str, input: &Value);

    /// A tool call finished.
    async fn tool_result(&self, tab_id: TabId, tool_use_id: &str, content: &str, is_error: bool);

    /// The todo list was replaced.
    async fn todos_updated(&self, tab_id: TabId, todos: &[Todo]);

    /// The run finished normally.
    async fn done(&self, tab_id: TabId);

    /// The run terminated with an error (stop, API failure, turn limit).
    async fn error(&self, tab_id: TabId, message: &str);
}

/// Sink that discards everything.
pub struct NullEvents;

#[async_trait]
impl AgentEvents for NullEvents {
    async fn assistant_message(&self, _tab_id: TabId, _message: &Message) {}
    async fn tool_call(&self, _tab_id: TabId, _id: &str, _name: &str, _input: &Value) {}
    async fn tool_result(&self, _tab_id: TabId, _id: &str, _content: &str, _is_error: bool) {}
    async fn todos_updated(&self, _tab_id: TabId, _todos: &[Todo]) {}
    async fn done(&self, _tab_id: TabId) {}
    async fn error(&self, _tab_id: TabId, _message: &str) {}
}
