//! Scripted provider for tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use pagehands_protocols::error::ProviderError;
use pagehands_protocols::provider::{CompletionRequest, CompletionResponse, LlmProvider};
use pagehands_protocols::types::{ContentBlock, StopReason, Usage};

/// Pops scripted responses front-first and records every request. An
/// exhausted script yields a plain end-turn response.
pub struct MockProvider {
    responses: Mutex<VecDeque<Result<CompletionResponse, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_text(&self, text: &str) {
        self.push_blocks(vec![ContentBlock::text(text)], StopReason::EndTurn);
    }

    pub fn push_tool_use(&self, text: &str, id: &str, name: &str, input: Value) {
        self.push_blocks(
            vec![
                ContentBlock::text(text),
                ContentBlock::ToolUse {
                    id: id.to_string(),
                    name: name.to_string(),
                    input,
                },
            ],
            StopReason::ToolUse,
        );
    }

    pub fn push_blocks(&self, content: Vec<ContentBlock>, stop_reason: StopReason) {
        self.responses.lock().push_back(Ok(CompletionResponse {
            id: format!("msg_{}", Uuid::new_v4().simple()),
            model: "mock".to_string(),
            content,
            stop_reason,
            usage: Usage::default(),
        }));
    }

    pub fn push_error(&self, error: ProviderError) {
        self.responses.lock().push_back(Err(error));
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn id(&self) -> &str {
        "mock"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        self.requests.lock().push(request);
        self.responses.lock().pop_front().unwrap_or_else(|| {
            Ok(CompletionResponse {
                id: "msg_default".to_string(),
                model: "mock".to_string(),
                content: vec![ContentBlock::text("Done.")],
                stop_reason: StopReason::EndTurn,
                usage: Usage::default(),
            })
        })
    }
}
