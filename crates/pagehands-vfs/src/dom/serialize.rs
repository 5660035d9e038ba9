//! HTML serialization: compact for change detection and innerHTML,
//! formatted for reads (one tag per line, leading whitespace trimmed) so
//! grep and diff stay stable across reflows.

use super::node::{is_void, Document, NodeData, NodeId};

/// Compact serialization of a node and its subtree.
pub fn outer_html(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, id, &mut out);
    out
}

/// Compact serialization of a node's children.
pub fn inner_html(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    for &child in &doc.node(id).children {
        write_node(doc, child, &mut out);
    }
    out
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    match &doc.node(id).data {
        NodeData::Text(text) => out.push_str(text),
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeData::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for (name, value) in &el.attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attr(value));
                out.push('"');
            }
            out.push('>');
            if is_void(&el.tag) {
                return;
            }
            for &child in &doc.node(id).children {
                write_node(doc, child, out);
            }
            out.push_str("</");
            out.push_str(&el.tag);
            out.push('>');
        }
    }
}

/// Formatted serialization: every tag on its own line, text lines trimmed
/// of leading whitespace, blank text dropped.
pub fn formatted(doc: &Document, id: NodeId) -> String {
    let mut lines = Vec::new();
    write_formatted(doc, id, &mut lines);
    lines.join("\n")
}

fn write_formatted(doc: &Document, id: NodeId, lines: &mut Vec<String>) {
    match &doc.node(id).data {
        NodeData::Text(text) => push_text_lines(text, lines),
        NodeData::Comment(text) => lines.push(format!("<!--{}-->", text.trim())),
        NodeData::Element(el) => {
            let mut open = String::new();
            open.push('<');
            open.push_str(&el.tag);
            for (name, value) in &el.attrs {
                open.push(' ');
                open.push_str(name);
                open.push_str("=\"");
                open.push_str(&escape_attr(value));
                open.push('"');
            }
            open.push('>');
            lines.push(open);
            if is_void(&el.tag) {
                return;
            }
            for &child in &doc.node(id).children {
                write_formatted(doc, child, lines);
            }
            lines.push(format!("</{}>", el.tag));
        }
    }
}

fn push_text_lines(text: &str, lines: &mut Vec<String>) {
    for line in text.lines() {
        let trimmed = line.trim_start();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }
}

fn escape_attr(value: &str) -> String {
    if value.contains('"') {
        value.replace('"', "&quot;")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
#[path = "serialize_tests.rs"]
mod tests;
