//! The live page document.
//!
//! One instance per page worker. Carries the version counter that backs
//! optimistic concurrency on `page.html`: any observed DOM mutation bumps
//! it, and a serialization snapshot suppresses spurious observer
//! callbacks. No lock is held across agent turns; a version mismatch at
//! edit time is the conflict signal.

use chrono::Utc;
use parking_lot::Mutex;
use regex::Regex;

use pagehands_protocols::error::VfsError;
use pagehands_protocols::types::PageLocation;

use crate::dom::{
    derive_selector, formatted, inner_html, outer_html, parse_document, parse_fragment, Document,
    Element, NodeId,
};
use crate::store::EditRecord;

/// Outcome of a page edit.
#[derive(Debug, Clone)]
pub struct PageEditOutcome {
    pub version: u64,
    pub replacements: usize,
    pub record: EditRecord,
}

pub struct PageDocument {
    location: PageLocation,
    inner: Mutex<PageState>,
}

struct PageState {
    doc: Document,
    version: u64,
    last_serialized: String,
}

impl PageDocument {
    /// Attach to a page. The initial version is 1.
    pub fn new(html: &str, location: PageLocation) -> Self {
        let doc = parse_document(html);
        let last_serialized = outer_html(&doc, doc.root);
        Self {
            location,
            inner: Mutex::new(PageState {
                doc,
                version: 1,
                last_serialized,
            }),
        }
    }

    pub fn location(&self) -> &PageLocation {
        &self.location
    }

    pub fn version(&self) -> u64 {
        self.inner.lock().version
    }

    /// Formatted serialization plus the current version.
    pub fn read_formatted(&self) -> (String, u64) {
        let state = self.inner.lock();
        (formatted(&state.doc, state.doc.root), state.version)
    }

    /// Mutate the DOM from outside the VFS (page scripts, user actions).
    /// The observer bumps the version iff the serialization changed.
    pub fn mutate_dom<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        let mut state = self.inner.lock();
        let result = f(&mut state.doc);
        state.observe();
        result
    }

    /// Replace head and body contents plus root-element attributes with
    /// the parsed replacement HTML.
    pub fn write_html(&self, html: &str, expected_version: u64) -> Result<u64, VfsError> {
        let mut state = self.inner.lock();
        if expected_version != state.version {
            return Err(VfsError::VersionMismatch {
                expected: expected_version,
                actual: state.version,
            });
        }

        let incoming = parse_document(html);

        let root = state.doc.root;
        if let (Some(target), Some(source)) =
            (state.doc.element_mut(root), incoming.element(incoming.root))
        {
            target.attrs = source.attrs.clone();
        }

        for (dst, src) in [
            (state.doc.head, incoming.head),
            (state.doc.body, incoming.body),
        ] {
            state.doc.detach_children(dst);
            for &child in &incoming.node(src).children.clone() {
                let copy = state.doc.copy_subtree(&incoming, child);
                state.doc.append_child(dst, copy);
            }
        }

        state.commit_internal_mutation();
        Ok(state.version)
    }

    /// Element-targeted search/replace on the page.
    ///
    /// Strategy order: literal substring, then whitespace-flexible
    /// matching. The most specific element containing the target is
    /// edited; when no single element contains it the edit falls back to
    /// `body`.
    pub fn edit(
        &self,
        old: &str,
        new: &str,
        expected_version: u64,
        replace_all: bool,
    ) -> Result<PageEditOutcome, VfsError> {
        let mut state = self.inner.lock();
        if expected_version != state.version {
            return Err(VfsError::VersionMismatch {
                expected: expected_version,
                actual: state.version,
            });
        }

        let flexible = whitespace_flexible_regex(old);
        let target = state
            .most_specific_containing(|html| html.contains(old))
            .or_else(|| {
                flexible
                    .as_ref()
                    .and_then(|re| state.most_specific_containing(|html| re.is_match(html)))
            })
            .unwrap_or_else(|| state.doc.body);

        let html = inner_html(&state.doc, target);
        let (replaced, replacements) = if html.contains(old) {
            replace_literal(&html, old, new, replace_all)
        } else if let Some(re) = flexible.as_ref().filter(|re| re.is_match(&html)) {
            replace_regex(&html, re, new, replace_all)
        } else {
            return Err(VfsError::NotFound(format!(
                "old_string not found in page: {}",
                preview(old)
            )));
        };

        let selector = derive_selector(&state.doc, target);
        set_inner_html(&mut state.doc, target, &replaced);
        state.commit_internal_mutation();

        Ok(PageEditOutcome {
            version: state.version,
            replacements,
            record: EditRecord {
                selector,
                old_content: old.to_string(),
                new_content: new.to_string(),
                timestamp: Utc::now().timestamp_millis(),
            },
        })
    }

    /// Create or replace the `<style>` element backing a stored style
    /// file. One element per file name; rewriting replaces the prior node.
    pub fn inject_style(&self, name: &str, css: &str) {
        let mut state = self.inner.lock();
        let element_id = style_element_id(name);
        let existing = state.find_style_element(&element_id);
        match existing {
            Some(style) => {
                state.doc.detach_children(style);
                let text = state.doc.create_text(css);
                state.doc.append_child(style, text);
            }
            None => {
                let mut element = Element::new("style");
                element.set_attr("id", &element_id);
                let style = state.doc.create_element(element);
                let text = state.doc.create_text(css);
                state.doc.append_child(style, text);
                let head = state.doc.head;
                state.doc.append_child(head, style);
            }
        }
        state.observe();
    }

    /// Remove the `<style>` element for a file, if present.
    pub fn remove_style(&self, name: &str) -> bool {
        let mut state = self.inner.lock();
        let element_id = style_element_id(name);
        let Some(style) = state.find_style_element(&element_id) else {
            return false;
        };
        let Some(parent) = state.doc.node(style).parent else {
            return false;
        };
        let children: Vec<NodeId> = state
            .doc
            .node(parent)
            .children
            .iter()
            .copied()
            .filter(|&c| c != style)
            .collect();
        state.doc.detach_children(parent);
        for child in children {
            state.doc.append_child(parent, child);
        }
        state.observe();
        true
    }
}

impl PageState {
    /// Observer callback: bump the version when the DOM actually changed.
    fn observe(&mut self) {
        let serialized = outer_html(&self.doc, self.doc.root);
        if serialized != self.last_serialized {
            self.version += 1;
            self.last_serialized = serialized;
        }
    }

    /// Internal mutations (write/edit) always count as one version step,
    /// even when the result serializes identically.
    fn commit_internal_mutation(&mut self) {
        self.version += 1;
        self.last_serialized = outer_html(&self.doc, self.doc.root);
    }

    /// Deepest element (in document order) whose innerHTML satisfies the
    /// predicate and none of whose element descendants also does.
    fn most_specific_containing(&self, matches: impl Fn(&str) -> bool) -> Option<NodeId> {
        let candidates: Vec<NodeId> = self
            .doc
            .descendant_elements(self.doc.root)
            .into_iter()
            .filter(|&id| matches(&inner_html(&self.doc, id)))
            .collect();
        candidates
            .iter()
            .copied()
            .find(|&id| !candidates.iter().any(|&other| self.doc.is_ancestor(id, other)))
    }

    fn find_style_element(&self, element_id: &str) -> Option<NodeId> {
        self.doc
            .descendant_elements(self.doc.root)
            .into_iter()
            .find(|&id| {
                self.doc.element(id).is_some_and(|el| {
                    el.tag == "style" && el.attr("id") == Some(element_id)
                })
            })
    }
}

fn set_inner_html(doc: &mut Document, target: NodeId, html: &str) {
    doc.detach_children(target);
    let roots = parse_fragment(doc, html);
    for id in roots {
        doc.append_child(target, id);
    }
}

/// Element id for a stored style file.
pub fn style_element_id(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("pagehands-style-{sanitized}")
}

/// Tokenized form of `old` with `\s+` between tokens, so edits survive
/// reformatted whitespace.
fn whitespace_flexible_regex(old: &str) -> Option<Regex> {
    let tokens: Vec<&str> = old.split_whitespace().collect();
    if tokens.len() < 2 {
        return None;
    }
    let source = tokens
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join(r"\s+");
    Regex::new(&source).ok()
}

fn replace_literal(html: &str, old: &str, new: &str, replace_all: bool) -> (String, usize) {
    let count = html.matches(old).count();
    if replace_all {
        (html.replace(old, new), count)
    } else {
        (html.replacen(old, new, 1), 1)
    }
}

fn replace_regex(html: &str, re: &Regex, new: &str, replace_all: bool) -> (String, usize) {
    let count = re.find_iter(html).count();
    let new_escaped = new.replace('$', "$$");
    if replace_all {
        (re.replace_all(html, new_escaped.as_str()).into_owned(), count)
    } else {
        (re.replacen(html, 1, new_escaped.as_str()).into_owned(), 1)
    }
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 80;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        let prefix: String = text.chars().take(LIMIT).collect();
        format!("{prefix}…")
    }
}

#[cfg(test)]
#[path = "page_tests.rs"]
mod tests;
