//! Best-effort stable selector derivation for edit records.
//!
//! An id wins outright. Otherwise the selector is tag-plus-classes,
//! climbing up to four ancestors, skipping classnames that look
//! build-generated (hashes, css-in-js prefixes) since those change on
//! every deploy.

use super::node::{Document, NodeId};

/// Derive a selector describing `id`'s position.
pub fn derive_selector(doc: &Document, id: NodeId) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current = Some(id);
    let mut climbed = 0;

    while let Some(node_id) = current {
        let Some(el) = doc.element(node_id) else {
            break;
        };
        if el.tag == "html" {
            break;
        }
        if let Some(el_id) = el.id() {
            parts.push(format!("#{el_id}"));
            break;
        }

        let mut part = el.tag.clone();
        for class in el.classes().into_iter().filter(|c| !looks_random(c)) {
            part.push('.');
            part.push_str(class);
        }
        parts.push(part);

        if el.tag == "body" || climbed >= 4 {
            break;
        }
        climbed += 1;
        current = doc.node(node_id).parent;
    }

    parts.reverse();
    parts.join(" > ")
}

/// Heuristic for classnames minted by bundlers and css-in-js runtimes.
fn looks_random(class: &str) -> bool {
    if class.starts_with("css-") || class.starts_with("sc-") || class.starts_with("jsx-") {
        return true;
    }
    if class.len() >= 16 {
        return true;
    }
    let digits = class.chars().filter(char::is_ascii_digit).count();
    digits >= 3 && class.len() >= 8
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod tests;
