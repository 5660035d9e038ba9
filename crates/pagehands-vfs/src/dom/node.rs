//! Arena-backed DOM nodes.

/// Index of a node in its document's arena.
pub type NodeId = usize;

/// Elements whose content model is raw text.
pub(crate) const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Void elements never carry children and serialize without a close tag.
pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub(crate) fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub(crate) fn is_raw_text(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

/// An element: lowercased tag plus attributes in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id").filter(|v| !v.is_empty())
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }
}

/// Node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Element(Element),
    Text(String),
    Comment(String),
}

/// A node in the arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// An arena-backed document with resolved `html`/`head`/`body` roots.
///
/// Detached nodes stay in the arena for the life of the document; pages
/// are session-scoped, so the slack is bounded and reclaimed on
/// navigation.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    pub root: NodeId,
    pub head: NodeId,
    pub body: NodeId,
}

impl Document {
    /// An empty arena with unresolved roots; the parser fills them in.
    pub(crate) fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            root: 0,
            head: 0,
            body: 0,
        }
    }

    /// A bare `<html><head></head><body></body></html>` shell.
    pub fn shell() -> Self {
        let mut doc = Self::empty();
        let root = doc.create_element(Element::new("html"));
        let head = doc.create_element(Element::new("head"));
        let body = doc.create_element(Element::new("body"));
        doc.append_child(root, head);
        doc.append_child(root, body);
        doc.root = root;
        doc.head = head;
        doc.body = body;
        doc
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn create_element(&mut self, element: Element) -> NodeId {
        self.push(NodeData::Element(element))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Comment(text.into()))
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    /// Detach and return all children of `parent`.
    pub fn detach_children(&mut self, parent: NodeId) -> Vec<NodeId> {
        let children = std::mem::take(&mut self.nodes[parent].children);
        for &child in &children {
            self.nodes[child].parent = None;
        }
        children
    }

    /// Preorder element descendants of `start`, excluding `start` itself.
    pub fn descendant_elements(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[start]
            .children
            .iter()
            .rev()
            .copied()
            .collect();
        while let Some(id) = stack.pop() {
            if matches!(self.nodes[id].data, NodeData::Element(_)) {
                out.push(id);
            }
            stack.extend(self.nodes[id].children.iter().rev().copied());
        }
        out
    }

    /// Whether `ancestor` is a strict ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.nodes[id].parent;
        while let Some(node_id) = current {
            if node_id == ancestor {
                return true;
            }
            current = self.nodes[node_id].parent;
        }
        false
    }

    /// First element child of `parent` with the given tag.
    pub fn child_element_by_tag(&self, parent: NodeId, tag: &str) -> Option<NodeId> {
        self.nodes[parent]
            .children
            .iter()
            .copied()
            .find(|&c| self.tag(c) == Some(tag))
    }

    /// Deep-copy a subtree from another document into this arena.
    /// The copy is returned unattached.
    pub fn copy_subtree(&mut self, src: &Document, src_id: NodeId) -> NodeId {
        let data = src.node(src_id).data.clone();
        let copy = self.push(data);
        for &child in &src.node(src_id).children {
            let child_copy = self.copy_subtree(src, child);
            self.append_child(copy, child_copy);
        }
        copy
    }
}
