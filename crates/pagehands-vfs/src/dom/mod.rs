//! Minimal in-process document model.
//!
//! The page worker holds the live page as an element tree: a permissive
//! HTML parser, a compact and a formatted serializer, and best-effort
//! selector derivation for edit records. Permissive means malformed markup
//! never fails to parse; stray close tags are ignored and unclosed
//! elements close at end of input.

mod node;
mod parser;
mod selector;
mod serialize;

pub use node::{Document, Element, Node, NodeData, NodeId};
pub use parser::{parse_document, parse_fragment};
pub use selector::derive_selector;
pub use serialize::{formatted, inner_html, outer_html};
