//! The tool catalog, per mode.
//!
//! Plan mode exposes the read-only surface plus Write (restricted to
//! `./plan.md` by both prompt and dispatch); execute mode adds Edit.

use serde_json::json;

use pagehands_protocols::tool::ToolDefinition;
use pagehands_protocols::types::AgentMode;

/// Tools handled inside the loop rather than forwarded to the page.
pub const LOCAL_TOOLS: &[&str] = &["TodoRead", "TodoWrite"];

pub fn is_local_tool(name: &str) -> bool {
    LOCAL_TOOLS.contains(&name)
}

/// The catalog sent to the model for a mode.
pub fn tool_definitions(mode: AgentMode) -> Vec<ToolDefinition> {
    let mut tools = vec![
        read_tool(),
        write_tool(),
        glob_tool(),
        grep_tool(),
        grep_count_tool(),
        bash_tool(),
        ls_tool(),
        screenshot_tool(),
        todo_read_tool(),
        todo_write_tool(),
    ];
    if mode == AgentMode::Execute {
        tools.insert(1, edit_tool());
    }
    tools
}

pub fn is_tool_available(mode: AgentMode, name: &str) -> bool {
    tool_definitions(mode).iter().any(|t| t.name == name)
}

/// Look up a tool's definition in a mode's catalog.
pub fn find_tool(mode: AgentMode, name: &str) -> Option<ToolDefinition> {
    tool_definitions(mode).into_iter().find(|t| t.name == name)
}

fn read_tool() -> ToolDefinition {
    ToolDefinition::new(
        "Read",
        "Read a virtual file. Returns content, version, and line count. \
         Use offset/limit (0-indexed lines) for large files.",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Virtual path, absolute or relative to the page"},
                "offset": {"type": "integer", "description": "First line to return (0-indexed)"},
                "limit": {"type": "integer", "description": "Number of lines to return"}
            },
            "required": ["path"]
        }),
    )
}

fn write_tool() -> ToolDefinition {
    ToolDefinition::new(
        "Write",
        "Create or overwrite a virtual file. expected_version must equal \
         the current version, or 0 for a new file.",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"},
                "expected_version": {"type": "integer"}
            },
            "required": ["path", "content", "expected_version"]
        }),
    )
}

fn edit_tool() -> ToolDefinition {
    ToolDefinition::new(
        "Edit",
        "Replace old_string with new_string in a virtual file. On \
         page.html the edit targets the most specific element containing \
         old_string and tolerates whitespace differences.",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "old_string": {"type": "string"},
                "new_string": {"type": "string"},
                "expected_version": {"type": "integer"},
                "replace_all": {"type": "boolean"}
            },
            "required": ["path", "old_string", "new_string", "expected_version"]
        }),
    )
}

fn glob_tool() -> ToolDefinition {
    ToolDefinition::new(
        "Glob",
        "Match virtual paths with a * / ? glob, scoped to the current page's directory.",
        json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string"}
            },
            "required": ["pattern"]
        }),
    )
}

fn grep_tool() -> ToolDefinition {
    ToolDefinition::new(
        "Grep",
        "Case-insensitive regex search across the page, scripts, and \
         styles (or one file). Returns up to 30 matches with context.",
        json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string"},
                "path": {"type": "string"},
                "context_lines": {"type": "integer"}
            },
            "required": ["pattern"]
        }),
    )
}

fn grep_count_tool() -> ToolDefinition {
    ToolDefinition::new(
        "GrepCount",
        "Count regex matches without returning content.",
        json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string"},
                "path": {"type": "string"}
            },
            "required": ["pattern"]
        }),
    )
}

fn bash_tool() -> ToolDefinition {
    ToolDefinition::new(
        "Bash",
        "Run JavaScript in the page's own world. Pass inline code, or \
         `exec <path>` to run a saved script file.",
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string"}
            },
            "required": ["command"]
        }),
    )
}

fn ls_tool() -> ToolDefinition {
    ToolDefinition::new(
        "Ls",
        "List a virtual directory. Defaults to the current page's directory.",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"}
            },
            "required": []
        }),
    )
}

fn screenshot_tool() -> ToolDefinition {
    ToolDefinition::new(
        "Screenshot",
        "Capture the visible page into ./screenshot.png, then Read it to see the image.",
        json!({
            "type": "object",
            "properties": {
                "format": {"type": "string", "enum": ["png", "jpeg"]},
                "quality": {"type": "integer"}
            },
            "required": []
        }),
    )
}

fn todo_read_tool() -> ToolDefinition {
    ToolDefinition::new(
        "TodoRead",
        "Read the current todo list for this tab.",
        json!({
            "type": "object",
            "properties": {},
            "required": []
        }),
    )
}

fn todo_write_tool() -> ToolDefinition {
    ToolDefinition::new(
        "TodoWrite",
        "Replace the todo list for this tab.",
        json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string"},
                            "content": {"type": "string"},
                            "status": {"type": "string", "enum": ["pending", "in_progress", "completed"]}
                        },
                        "required": ["id", "content", "status"]
                    }
                }
            },
            "required": ["todos"]
        }),
    )
}
