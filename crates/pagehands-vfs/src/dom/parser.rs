//! Permissive HTML parsing.

use super::node::{is_raw_text, is_void, Document, Element, NodeId};

/// Parse a full document. The result always has `html`, `head`, and `body`
/// resolved: an existing `<html>` element is adopted; otherwise a shell is
/// created and all parsed content lands in `body`.
pub fn parse_document(html: &str) -> Document {
    let mut doc = Document::empty();
    let roots = parse_nodes(&mut doc, html);

    let html_id = roots.iter().copied().find(|&id| doc.tag(id) == Some("html"));
    match html_id {
        Some(root) => {
            let head = match doc.child_element_by_tag(root, "head") {
                Some(id) => id,
                None => {
                    let id = doc.create_element(Element::new("head"));
                    doc.append_child(root, id);
                    id
                }
            };
            let body = match doc.child_element_by_tag(root, "body") {
                Some(id) => id,
                None => {
                    let id = doc.create_element(Element::new("body"));
                    doc.append_child(root, id);
                    id
                }
            };
            doc.root = root;
            doc.head = head;
            doc.body = body;
        }
        None => {
            // No <html> wrapper. Adopt top-level <head>/<body> elements if
            // present; everything else lands in body.
            let root = doc.create_element(Element::new("html"));
            let head = match roots.iter().copied().find(|&id| doc.tag(id) == Some("head")) {
                Some(id) => id,
                None => doc.create_element(Element::new("head")),
            };
            let body = match roots.iter().copied().find(|&id| doc.tag(id) == Some("body")) {
                Some(id) => id,
                None => doc.create_element(Element::new("body")),
            };
            doc.append_child(root, head);
            doc.append_child(root, body);
            for id in roots {
                if id != head && id != body {
                    doc.append_child(body, id);
                }
            }
            doc.root = root;
            doc.head = head;
            doc.body = body;
        }
    }
    doc
}

/// Parse markup into unattached nodes inside an existing arena.
pub fn parse_fragment(doc: &mut Document, html: &str) -> Vec<NodeId> {
    parse_nodes(doc, html)
}

fn parse_nodes(doc: &mut Document, html: &str) -> Vec<NodeId> {
    let bytes = html.as_bytes();
    let mut roots: Vec<NodeId> = Vec::new();
    let mut stack: Vec<NodeId> = Vec::new();
    let mut pos = 0;

    macro_rules! attach {
        ($id:expr) => {
            if let Some(&parent) = stack.last() {
                doc.append_child(parent, $id);
            } else {
                roots.push($id);
            }
        };
    }

    while pos < bytes.len() {
        let open = find_byte(bytes, b'<', pos);
        let text_end = open.unwrap_or(bytes.len());
        if text_end > pos {
            let text = &html[pos..text_end];
            if !text.trim().is_empty() || !stack.is_empty() {
                let id = doc.create_text(text);
                attach!(id);
            }
            pos = text_end;
        }
        let Some(open) = open else { break };

        if html[open..].starts_with("<!--") {
            let end = html[open + 4..].find("-->").map(|i| open + 4 + i);
            let (content, next) = match end {
                Some(end) => (&html[open + 4..end], end + 3),
                None => (&html[open + 4..], bytes.len()),
            };
            let id = doc.create_comment(content);
            attach!(id);
            pos = next;
        } else if html[open..].starts_with("<!") {
            // Doctype or declaration: skip.
            pos = find_byte(bytes, b'>', open).map_or(bytes.len(), |i| i + 1);
        } else if html[open..].starts_with("</") {
            let name_end = scan_name(bytes, open + 2);
            let name = html[open + 2..name_end].to_ascii_lowercase();
            pos = find_byte(bytes, b'>', name_end).map_or(bytes.len(), |i| i + 1);
            // Pop through the matching open element; ignore stray closes.
            if let Some(depth) = stack
                .iter()
                .rposition(|&id| doc.tag(id) == Some(name.as_str()))
            {
                stack.truncate(depth);
            }
        } else if bytes
            .get(open + 1)
            .is_some_and(|b| b.is_ascii_alphabetic())
        {
            let (element, self_closing, next) = parse_open_tag(html, open);
            let tag = element.tag.clone();
            let id = doc.create_element(element);
            attach!(id);
            pos = next;
            if self_closing || is_void(&tag) {
                continue;
            }
            if is_raw_text(&tag) {
                let (content, after) = read_raw_text(html, pos, &tag);
                if !content.is_empty() {
                    let text = doc.create_text(content);
                    doc.append_child(id, text);
                }
                pos = after;
            } else {
                stack.push(id);
            }
        } else {
            // A lone `<` that opens nothing: literal text up to the next tag.
            let next = find_byte(bytes, b'<', open + 1).unwrap_or(bytes.len());
            let id = doc.create_text(&html[open..next]);
            attach!(id);
            pos = next;
        }
    }

    roots
}

fn parse_open_tag(html: &str, open: usize) -> (Element, bool, usize) {
    let bytes = html.as_bytes();
    let name_end = scan_name(bytes, open + 1);
    let mut element = Element::new(html[open + 1..name_end].to_ascii_lowercase());
    let mut pos = name_end;
    let mut self_closing = false;

    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        match bytes.get(pos) {
            None => break,
            Some(b'>') => {
                pos += 1;
                break;
            }
            Some(b'/') => {
                if bytes.get(pos + 1) == Some(&b'>') {
                    self_closing = true;
                    pos += 2;
                    break;
                }
                pos += 1;
            }
            Some(_) => {
                let attr_start = pos;
                while pos < bytes.len()
                    && !bytes[pos].is_ascii_whitespace()
                    && !matches!(bytes[pos], b'=' | b'/' | b'>')
                {
                    pos += 1;
                }
                let name = html[attr_start..pos].to_ascii_lowercase();
                if name.is_empty() {
                    pos += 1;
                    continue;
                }
                while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                    pos += 1;
                }
                let value = if bytes.get(pos) == Some(&b'=') {
                    pos += 1;
                    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                        pos += 1;
                    }
                    match bytes.get(pos) {
                        Some(&quote @ (b'"' | b'\'')) => {
                            let start = pos + 1;
                            let end = find_byte(bytes, quote, start).unwrap_or(bytes.len());
                            pos = (end + 1).min(bytes.len());
                            html[start..end.min(bytes.len())].to_string()
                        }
                        _ => {
                            let start = pos;
                            while pos < bytes.len()
                                && !bytes[pos].is_ascii_whitespace()
                                && bytes[pos] != b'>'
                            {
                                pos += 1;
                            }
                            html[start..pos].to_string()
                        }
                    }
                } else {
                    String::new()
                };
                element.attrs.push((name, value));
            }
        }
    }

    (element, self_closing, pos)
}

/// Raw-text content runs to the matching case-insensitive close tag.
fn read_raw_text<'a>(html: &'a str, from: usize, tag: &str) -> (&'a str, usize) {
    let lower = html.to_ascii_lowercase();
    let needle = format!("</{tag}");
    match lower[from..].find(&needle) {
        Some(offset) => {
            let content_end = from + offset;
            let close_end = find_byte(html.as_bytes(), b'>', content_end)
                .map_or(html.len(), |i| i + 1);
            (&html[from..content_end], close_end)
        }
        None => (&html[from..], html.len()),
    }
}

fn scan_name(bytes: &[u8], from: usize) -> usize {
    let mut pos = from;
    while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'-') {
        pos += 1;
    }
    pos
}

fn find_byte(bytes: &[u8], byte: u8, from: usize) -> Option<usize> {
    bytes[from..].iter().position(|&b| b == byte).map(|i| from + i)
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
