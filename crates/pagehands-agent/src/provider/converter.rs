//! Protocol/wire conversion.

use serde_json::json;

use pagehands_protocols::error::ProviderError;
use pagehands_protocols::provider::{CompletionRequest, CompletionResponse};
use pagehands_protocols::types::{MessageContent, Role};

use super::api::{ApiMessage, ApiRequest, ApiResponse};

pub fn to_api_request(request: &CompletionRequest) -> Result<ApiRequest, ProviderError> {
    let messages = request
        .messages
        .iter()
        .map(|m| {
            let content = match &m.content {
                MessageContent::Text(text) => json!(text),
                MessageContent::Blocks(blocks) => serde_json::to_value(blocks)
                    .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?,
            };
            Ok(ApiMessage {
                role: match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content,
            })
        })
        .collect::<Result<Vec<_>, ProviderError>>()?;

    Ok(ApiRequest {
        model: request.model.clone(),
        max_tokens: request.max_tokens,
        system: request.system.clone(),
        messages,
        tools: request.tools.iter().map(|t| t.to_wire()).collect(),
    })
}

pub fn parse_response(api: ApiResponse) -> CompletionResponse {
    CompletionResponse {
        id: api.id,
        model: api.model,
        content: api.content,
        stop_reason: api.stop_reason,
        usage: api.usage,
    }
}
