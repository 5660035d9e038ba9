//! Completion request types.

use serde::{Deserialize, Serialize};

use crate::tool::ToolDefinition;
use crate::types::Message;

/// Request for a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model to use.
    pub model: String,

    /// System prompt, sent separately from the message list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Full conversation history, replayed every turn.
    pub messages: Vec<Message>,

    /// Tool catalog for this turn.
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,

    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            system: None,
            messages,
            tools: Vec::new(),
            max_tokens: 8192,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let req = CompletionRequest::new("test-model", vec![Message::user("hi")])
            .with_system("You are a page agent.")
            .with_max_tokens(1024);
        assert_eq!(req.model, "test-model");
        assert_eq!(req.system.as_deref(), Some("You are a page agent."));
        assert_eq!(req.max_tokens, 1024);
        assert!(req.tools.is_empty());
    }
}
