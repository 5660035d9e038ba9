//! Bridge from the loop to the per-tab page worker.

use async_trait::async_trait;
use serde_json::Value;

use pagehands_protocols::error::FabricError;
use pagehands_protocols::types::TabId;

/// Forwards page-bound tool calls to the tab's page worker.
///
/// The returned value is the tool's JSON payload; VFS errors arrive as
/// payloads carrying an `error` kind, not as `Err`; only transport
/// failures are `Err`.
#[async_trait]
pub trait ToolBridge: Send + Sync {
    async fn page_tool(
        &self,
        tab_id: TabId,
        name: &str,
        input: Value,
    ) -> Result<Value, FabricError>;
}
