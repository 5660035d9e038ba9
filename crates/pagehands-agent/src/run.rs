//! The bounded tool-use loop.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use pagehands_protocols::error::AgentError;
use pagehands_protocols::provider::{CompletionRequest, LlmProvider};
use pagehands_protocols::types::{AgentMode, ContentBlock, Message, StopReason, TabId, Todo};

use crate::bridge::ToolBridge;
use crate::catalog;
use crate::dispatch::{dispatch_tool, result_text};
use crate::events::AgentEvents;
use crate::prompts;

/// Turn cap per run.
pub const MAX_TURNS: usize = 500;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model: String,
    pub max_tokens: u32,
    pub max_turns: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 8192,
            max_turns: MAX_TURNS,
        }
    }
}

/// Per-run identity and cancellation.
#[derive(Clone)]
pub struct TurnContext {
    pub tab_id: TabId,
    pub mode: AgentMode,
    pub cancel: CancellationToken,
}

pub struct AgentLoop {
    provider: Arc<dyn LlmProvider>,
    bridge: Arc<dyn ToolBridge>,
    events: Arc<dyn AgentEvents>,
    config: AgentConfig,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        bridge: Arc<dyn ToolBridge>,
        events: Arc<dyn AgentEvents>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            bridge,
            events,
            config,
        }
    }

    /// Run one user turn to completion.
    ///
    /// Appends the user message, then loops: call the model with the full
    /// history, store the assistant blocks verbatim, dispatch tool_use
    /// blocks in order, append their results as one user message, repeat
    /// until a response carries no tool calls (or ends the turn). Terminal
    /// failures are emitted as error events and returned.
    pub async fn run_turn(
        &self,
        ctx: &TurnContext,
        user_message: String,
        history: &mut Vec<Message>,
        todos: &mut Vec<Todo>,
    ) -> Result<(), AgentError> {
        history.push(Message::user(user_message));

        for turn in 0..self.config.max_turns {
            if ctx.cancel.is_cancelled() {
                return self.fail(ctx, AgentError::Stopped).await;
            }

            let request = CompletionRequest::new(self.config.model.clone(), history.clone())
                .with_system(prompts::system_prompt(ctx.mode))
                .with_tools(catalog::tool_definitions(ctx.mode))
                .with_max_tokens(self.config.max_tokens);

            let response = tokio::select! {
                _ = ctx.cancel.cancelled() => {
                    return self.fail(ctx, AgentError::Stopped).await;
                }
                result = self.provider.complete(request) => match result {
                    Ok(response) => response,
                    Err(err) => return self.fail(ctx, AgentError::Api(err)).await,
                },
            };
            debug!(tab_id = ctx.tab_id, turn, stop_reason = ?response.stop_reason, "model response");

            let assistant = Message::assistant_blocks(response.content.clone());
            history.push(assistant.clone());
            self.events.assistant_message(ctx.tab_id, &assistant).await;

            let tool_uses: Vec<(String, String, Value)> = response
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse { id, name, input } => {
                        Some((id.clone(), name.clone(), input.clone()))
                    }
                    _ => None,
                })
                .collect();

            if tool_uses.is_empty() {
                self.events.done(ctx.tab_id).await;
                return Ok(());
            }

            let mut results = Vec::with_capacity(tool_uses.len());
            for (id, name, input) in tool_uses {
                if ctx.cancel.is_cancelled() {
                    return self.fail(ctx, AgentError::Stopped).await;
                }
                self.events.tool_call(ctx.tab_id, &id, &name, &input).await;
                let block = dispatch_tool(
                    self.bridge.as_ref(),
                    self.events.as_ref(),
                    ctx.tab_id,
                    ctx.mode,
                    &id,
                    &name,
                    &input,
                    todos,
                )
                .await;
                let (content, is_error) = result_text(&block);
                self.events
                    .tool_result(ctx.tab_id, &id, &content, is_error)
                    .await;
                results.push(block);
            }
            history.push(Message::user_blocks(results));

            if response.stop_reason == StopReason::EndTurn {
                self.events.done(ctx.tab_id).await;
                return Ok(());
            }
        }

        warn!(tab_id = ctx.tab_id, "turn limit exhausted");
        self.fail(ctx, AgentError::MaxTurns(self.config.max_turns))
            .await
    }

    async fn fail(&self, ctx: &TurnContext, error: AgentError) -> Result<(), AgentError> {
        self.events.error(ctx.tab_id, &error.to_string()).await;
        Err(error)
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
