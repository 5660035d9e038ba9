//! LLM provider trait definition.

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse};
use crate::error::ProviderError;

/// Core trait for LLM providers.
///
/// The agent loop is message-grained: it sends the full history and
/// receives a complete assistant message per call.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider ID for diagnostics.
    fn id(&self) -> &str;

    /// Generate a completion.
    async fn complete(&self, request: CompletionRequest)
        -> Result<CompletionResponse, ProviderError>;
}
