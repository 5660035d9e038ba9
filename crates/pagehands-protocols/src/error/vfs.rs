//! Virtual filesystem errors.

use thiserror::Error;

/// Errors surfaced by VFS operations.
///
/// Inside tool calls these are packaged as tool_result payloads and handed
/// back to the model; they never terminate the agent run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VfsError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error(
        "Version mismatch: expected {expected}, actual {actual}. \
         The file changed since it was read; read it again and retry with the current version"
    )]
    VersionMismatch { expected: u64, actual: u64 },

    #[error(
        "Content is {chars} characters, over the {limit} limit. \
         Use Grep to search it, or Read with offset/limit to page through it"
    )]
    ContentTooLarge { chars: usize, limit: usize },

    #[error("Store error: {0}")]
    Store(String),
}

impl VfsError {
    /// Stable machine-readable kind string.
    pub fn kind(&self) -> &'static str {
        match self {
            VfsError::InvalidPath(_) => "INVALID_PATH",
            VfsError::NotFound(_) => "NOT_FOUND",
            VfsError::PermissionDenied(_) => "PERMISSION_DENIED",
            VfsError::VersionMismatch { .. } => "VERSION_MISMATCH",
            VfsError::ContentTooLarge { .. } => "CONTENT_TOO_LARGE",
            VfsError::Store(_) => "STORE_ERROR",
        }
    }

    /// JSON payload handed to the model as a tool result.
    pub fn to_payload(&self) -> serde_json::Value {
        let mut payload = serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        if let VfsError::VersionMismatch { expected, actual } = self {
            payload["expectedVersion"] = serde_json::json!(expected);
            payload["actualVersion"] = serde_json::json!(actual);
        }
        payload
    }
}
