//! Tool definition types.

use serde::{Deserialize, Serialize};

/// Definition of a tool exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name as it appears in tool_use blocks.
    pub name: String,

    /// Description shown to the model.
    pub description: String,

    /// JSON Schema for the input.
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Wire shape for the messages API tool catalog.
    pub fn to_wire(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "input_schema": self.input_schema,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_has_input_schema() {
        let def = ToolDefinition::new(
            "Read",
            "Read a virtual file",
            serde_json::json!({"type": "object", "properties": {"path": {"type": "string"}}, "required": ["path"]}),
        );
        let wire = def.to_wire();
        assert_eq!(wire["name"], "Read");
        assert_eq!(wire["input_schema"]["type"], "object");
    }
}
