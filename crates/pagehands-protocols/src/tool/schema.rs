//! Lightweight JSON-schema validation for tool inputs.
//!
//! Covers the subset the tool catalog uses: object shape, required
//! properties, primitive property types, string enums, and typed array
//! items. Validation happens at the model boundary; a failure becomes an
//! error tool_result, never a thrown error.

use serde_json::Value;

/// Validate `input` against `schema`. Returns a human-readable reason on
/// failure.
pub fn validate_input(schema: &Value, input: &Value) -> Result<(), String> {
    if schema.get("type").and_then(Value::as_str) == Some("object") && !input.is_object() {
        return Err("input must be an object".to_string());
    }

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if input.get(name).is_none() {
                return Err(format!("missing required property \"{name}\""));
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (name, prop_schema) in properties {
        let Some(value) = input.get(name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        check_value(name, prop_schema, value)?;
    }

    Ok(())
}

fn check_value(name: &str, schema: &Value, value: &Value) -> Result<(), String> {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        let ok = match expected {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            _ => true,
        };
        if !ok {
            return Err(format!("property \"{name}\" must be a {expected}"));
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(format!(
                "property \"{name}\" must be one of {}",
                serde_json::to_string(allowed).unwrap_or_default()
            ));
        }
    }

    if let (Some(items), Some(elements)) = (schema.get("items"), value.as_array()) {
        for (index, element) in elements.iter().enumerate() {
            check_value(&format!("{name}[{index}]"), items, element)?;
            if let Some(item_schema) = items.as_object() {
                if item_schema.get("type").and_then(Value::as_str) == Some("object") {
                    validate_input(items, element)
                        .map_err(|e| format!("property \"{name}[{index}]\": {e}"))?;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
