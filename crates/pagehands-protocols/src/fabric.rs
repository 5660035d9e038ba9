//! Fabric message vocabulary.
//!
//! Three contexts talk over the fabric: the UI panel, the background
//! worker, and per-tab page workers. Scalar traffic uses
//! [`Request`]/[`Response`]; per-turn streaming from background to UI uses
//! [`StreamEvent`]; background-to-page traffic uses
//! [`PageRequest`]/[`PageResponse`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::host::{ImageFormat, MainWorldOutcome};
use crate::types::{AgentMode, Message, TabId, Todo};

/// Persisted artifact kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Script,
    Style,
}

impl ArtifactKind {
    /// The virtual directory holding this kind.
    pub fn dir_name(&self) -> &'static str {
        match self {
            ArtifactKind::Script => "scripts",
            ArtifactKind::Style => "styles",
        }
    }
}

/// A stored file as listed to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VfsFileInfo {
    pub domain: String,
    pub url_path: String,
    pub kind: ArtifactKind,
    pub name: String,
    pub version: u64,
    pub enabled: bool,
    pub modified: i64,
}

/// Scalar requests from the UI to the background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    ChatMessage {
        tab_id: TabId,
        content: String,
    },
    StopAgent {
        tab_id: TabId,
    },
    ClearHistory {
        tab_id: TabId,
    },
    GetHistory {
        tab_id: TabId,
    },
    SetMode {
        tab_id: TabId,
        mode: AgentMode,
    },
    GetMode {
        tab_id: TabId,
    },
    ApprovePlan {
        tab_id: TabId,
    },
    RejectPlan {
        tab_id: TabId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        feedback: Option<String>,
    },
    GetVfsFiles {
        tab_id: TabId,
    },
    DeleteVfsFile {
        tab_id: TabId,
        kind: ArtifactKind,
        name: String,
    },
    ToggleVfsFileEnabled {
        tab_id: TabId,
        kind: ArtifactKind,
        name: String,
    },
    SetAllVfsFilesEnabled {
        enabled: bool,
    },
    CaptureScreenshot {
        format: ImageFormat,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quality: Option<u8>,
    },
    ExecuteInMainWorld {
        code: String,
    },
    ImportVfsBundle {
        bundle: Value,
    },
}

/// Responses to scalar requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    Ack,
    History {
        messages: Vec<Message>,
    },
    ModeState {
        mode: AgentMode,
        todos: Vec<Todo>,
        awaiting_approval: bool,
    },
    VfsFiles {
        files: Vec<VfsFileInfo>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Deleted {
        removed: bool,
    },
    Screenshot {
        data_url: String,
    },
    MainWorld {
        outcome: MainWorldOutcome,
    },
}

/// Streamed events from the background to a tab's UI port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamEvent {
    AgentResponse {
        tab_id: TabId,
        message: Message,
    },
    ToolCall {
        tab_id: TabId,
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tab_id: TabId,
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
    TodosUpdated {
        tab_id: TabId,
        todos: Vec<Todo>,
    },
    ModeChanged {
        tab_id: TabId,
        mode: AgentMode,
        awaiting_approval: bool,
    },
    AgentDone {
        tab_id: TabId,
    },
    AgentError {
        tab_id: TabId,
        message: String,
    },
    VfsStorageChanged {
        key: String,
    },
}

/// One-shot requests from the background to a page worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageRequest {
    /// Dispatch a VFS-backed tool call.
    Tool { name: String, input: Value },
    /// Enumerate stored files matching this page.
    ListFiles,
    /// Mark the page worker's store cache dirty.
    InvalidateVfsCache,
    /// Remove a stored artifact (and any injected style element).
    DeleteFile { kind: ArtifactKind, name: String },
    /// Flip a stored artifact's enabled flag.
    ToggleFileEnabled { kind: ArtifactKind, name: String },
}

/// Responses from a page worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageResponse {
    Tool { result: Value },
    Files { files: Vec<VfsFileInfo> },
    Deleted { removed: bool },
    Toggled { enabled: bool },
    Ack,
}

/// Name of the long-lived UI channel for a tab.
pub fn sidebar_port_name(tab_id: TabId) -> String {
    format!("sidebar:tab:{tab_id}")
}

#[cfg(test)]
#[path = "fabric_tests.rs"]
mod tests;
