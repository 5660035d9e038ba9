//! Agent loop errors.

use thiserror::Error;

use super::ProviderError;

/// Terminal outcomes of an agent run that are not normal completion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    #[error("Stopped by user")]
    Stopped,

    #[error("Model API error: {0}")]
    Api(#[from] ProviderError),

    #[error("Agent stopped after reaching the {0}-turn limit")]
    MaxTurns(usize),
}
