//! Completion response types.

use serde::{Deserialize, Serialize};

use crate::types::{ContentBlock, StopReason, Usage};

/// Response from a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Unique ID for this completion.
    pub id: String,

    /// Model that produced it.
    pub model: String,

    /// Content blocks, stored and replayed verbatim.
    pub content: Vec<ContentBlock>,

    /// Why generation stopped.
    pub stop_reason: StopReason,

    /// Token usage.
    pub usage: Usage,
}

impl CompletionResponse {
    /// The tool_use blocks of this response, in order.
    pub fn tool_uses(&self) -> Vec<&ContentBlock> {
        self.content
            .iter()
            .filter(|b| matches!(b, ContentBlock::ToolUse { .. }))
            .collect()
    }

    /// Concatenated text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
