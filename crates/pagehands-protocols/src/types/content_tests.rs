use super::*;

#[test]
fn text_content() {
    let content = MessageContent::Text("Hello".to_string());
    assert_eq!(content.text(), "Hello");
}

#[test]
fn blocks_text_concatenation() {
    let content = MessageContent::Blocks(vec![
        ContentBlock::text("First"),
        ContentBlock::ToolUse {
            id: "tu_1".to_string(),
            name: "Read".to_string(),
            input: serde_json::json!({"path": "page.html"}),
        },
        ContentBlock::text("Second"),
    ]);
    assert_eq!(content.text(), "First\nSecond");
}

#[test]
fn tool_uses_preserve_order() {
    let content = MessageContent::Blocks(vec![
        ContentBlock::ToolUse {
            id: "tu_1".to_string(),
            name: "Read".to_string(),
            input: serde_json::json!({}),
        },
        ContentBlock::text("thinking"),
        ContentBlock::ToolUse {
            id: "tu_2".to_string(),
            name: "Grep".to_string(),
            input: serde_json::json!({}),
        },
    ]);
    let uses = content.tool_uses();
    assert_eq!(uses.len(), 2);
    match uses[0] {
        ContentBlock::ToolUse { id, .. } => assert_eq!(id, "tu_1"),
        _ => panic!("expected tool_use"),
    }
}

#[test]
fn tool_use_serialization_tag() {
    let block = ContentBlock::ToolUse {
        id: "tu_1".to_string(),
        name: "Edit".to_string(),
        input: serde_json::json!({"path": "./plan.md"}),
    };
    let json = serde_json::to_value(&block).unwrap();
    assert_eq!(json["type"], "tool_use");
    assert_eq!(json["name"], "Edit");
}

#[test]
fn tool_result_roundtrip() {
    let block = ContentBlock::tool_result("tu_9", "ok");
    let json = serde_json::to_string(&block).unwrap();
    let parsed: ContentBlock = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, block);
}

#[test]
fn tool_result_error_flag() {
    let block = ContentBlock::tool_result_error("tu_9", "boom");
    let json = serde_json::to_value(&block).unwrap();
    assert_eq!(json["is_error"], true);
}

#[test]
fn tool_result_with_image_pair() {
    let block = ContentBlock::ToolResult {
        tool_use_id: "tu_1".to_string(),
        content: ToolResultContent::Blocks(vec![
            ContentBlock::text("{\"path\":\"./screenshot.png\"}"),
            ContentBlock::image_base64("image/png", "aGVsbG8="),
        ]),
        is_error: false,
    };
    let json = serde_json::to_value(&block).unwrap();
    let content = json["content"].as_array().unwrap();
    assert_eq!(content.len(), 2);
    assert_eq!(content[1]["type"], "image");
    assert_eq!(content[1]["source"]["type"], "base64");
    assert_eq!(content[1]["source"]["media_type"], "image/png");
}

#[test]
fn untagged_content_deserializes_string() {
    let content: MessageContent = serde_json::from_str("\"plain\"").unwrap();
    assert_eq!(content, MessageContent::Text("plain".to_string()));
}

#[test]
fn untagged_content_deserializes_blocks() {
    let content: MessageContent =
        serde_json::from_str(r#"[{"type":"text","text":"hi"}]"#).unwrap();
    assert_eq!(content.text(), "hi");
}
