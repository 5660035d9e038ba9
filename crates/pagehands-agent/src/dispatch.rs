//! Tool dispatch and result shaping.
//!
//! Every tool_use becomes exactly one tool_result block: schema
//! violations, mode restrictions, VFS errors, and transport failures all
//! surface as error payloads for the model, never as loop-terminating
//! errors. Results are serialized to JSON and truncated; the one
//! deviation is a Read that returns screenshot data, which becomes a
//! [text, image] block pair.

use serde_json::{json, Value};

use pagehands_protocols::tool::validate_input;
use pagehands_protocols::types::{AgentMode, ContentBlock, TabId, Todo, ToolResultContent};

use crate::bridge::ToolBridge;
use crate::catalog;
use crate::events::AgentEvents;

/// Serialized tool results are truncated to this many characters.
pub const RESULT_CHAR_LIMIT: usize = 15_000;

const TRUNCATION_MARKER: &str = "… [result truncated]";

/// Dispatch one tool call and shape its result block.
pub async fn dispatch_tool(
    bridge: &dyn ToolBridge,
    events: &dyn AgentEvents,
    tab_id: TabId,
    mode: AgentMode,
    tool_use_id: &str,
    name: &str,
    input: &Value,
    todos: &mut Vec<Todo>,
) -> ContentBlock {
    let Some(definition) = catalog::find_tool(mode, name) else {
        return error_result(
            tool_use_id,
            &format!("Tool {name} is not available in {mode} mode"),
        );
    };

    if let Err(reason) = validate_input(&definition.input_schema, input) {
        return error_result(tool_use_id, &format!("Invalid input for {name}: {reason}"));
    }

    if mode == AgentMode::Plan && name == "Write" && !writes_plan(input) {
        return error_result(
            tool_use_id,
            "In plan mode Write is restricted to ./plan.md",
        );
    }

    if catalog::is_local_tool(name) {
        return dispatch_local(events, tab_id, tool_use_id, name, input, todos).await;
    }

    match bridge.page_tool(tab_id, name, input.clone()).await {
        Ok(value) => shape_page_result(tool_use_id, name, value),
        Err(err) => error_result(tool_use_id, &err.to_string()),
    }
}

/// Whether a Write input targets the page's plan file.
fn writes_plan(input: &Value) -> bool {
    input
        .get("path")
        .and_then(Value::as_str)
        .map(|p| {
            let p = p.trim();
            p == "plan.md" || p == "./plan.md" || p.ends_with("/plan.md")
        })
        .unwrap_or(false)
}

async fn dispatch_local(
    events: &dyn AgentEvents,
    tab_id: TabId,
    tool_use_id: &str,
    name: &str,
    input: &Value,
    todos: &mut Vec<Todo>,
) -> ContentBlock {
    match name {
        "TodoRead" => ContentBlock::tool_result(tool_use_id, shape(&json!({ "todos": todos }))),
        "TodoWrite" => {
            let parsed: Result<Vec<Todo>, _> =
                serde_json::from_value(input.get("todos").cloned().unwrap_or(Value::Null));
            match parsed {
                Ok(next) => {
                    *todos = next;
                    events.todos_updated(tab_id, todos).await;
                    ContentBlock::tool_result(
                        tool_use_id,
                        shape(&json!({ "ok": true, "count": todos.len() })),
                    )
                }
                Err(err) => error_result(tool_use_id, &format!("Invalid todos: {err}")),
            }
        }
        _ => error_result(tool_use_id, &format!("Unknown local tool {name}")),
    }
}

/// Shape a page-tool payload. VFS error payloads carry an `error` kind and
/// become error results; a Read that returned a screenshot data URL
/// becomes a [text, image] pair.
fn shape_page_result(tool_use_id: &str, name: &str, value: Value) -> ContentBlock {
    if value.get("error").is_some() {
        return ContentBlock::ToolResult {
            tool_use_id: tool_use_id.to_string(),
            content: ToolResultContent::Text(shape(&value)),
            is_error: true,
        };
    }

    if name == "Read" {
        if let Some(pair) = screenshot_pair(&value) {
            return ContentBlock::ToolResult {
                tool_use_id: tool_use_id.to_string(),
                content: ToolResultContent::Blocks(pair),
                is_error: false,
            };
        }
    }

    ContentBlock::tool_result(tool_use_id, shape(&value))
}

/// Split a data-URL screenshot read into its text metadata and image
/// block.
fn screenshot_pair(value: &Value) -> Option<Vec<ContentBlock>> {
    let content = value.get("content").and_then(Value::as_str)?;
    let rest = content.strip_prefix("data:")?;
    let (media_type, data) = rest.split_once(";base64,")?;
    if !media_type.starts_with("image/") {
        return None;
    }

    let mut meta = value.clone();
    if let Some(object) = meta.as_object_mut() {
        object.insert("content".to_string(), json!("<screenshot attached>"));
    }
    Some(vec![
        ContentBlock::text(shape(&meta)),
        ContentBlock::image_base64(media_type, data),
    ])
}

fn error_result(tool_use_id: &str, message: &str) -> ContentBlock {
    ContentBlock::ToolResult {
        tool_use_id: tool_use_id.to_string(),
        content: ToolResultContent::Text(shape(&json!({ "error": message }))),
        is_error: true,
    }
}

/// Serialize and truncate a payload for the model.
pub fn shape(value: &Value) -> String {
    let serialized = value.to_string();
    if serialized.chars().count() <= RESULT_CHAR_LIMIT {
        return serialized;
    }
    let prefix: String = serialized.chars().take(RESULT_CHAR_LIMIT).collect();
    format!("{prefix}{TRUNCATION_MARKER}")
}

/// Display text of a result block, for stream events.
pub fn result_text(block: &ContentBlock) -> (String, bool) {
    match block {
        ContentBlock::ToolResult {
            content, is_error, ..
        } => (content.text(), *is_error),
        _ => (String::new(), false),
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
