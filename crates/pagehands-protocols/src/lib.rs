//! Shared protocol layer for the PageHands workspace.
//!
//! Every crate in the workspace speaks the vocabulary defined here:
//! conversation messages and content blocks, tool definitions, the LLM
//! provider trait, the host-facility seams (user-script registration,
//! principal-world execution, screenshot capture), the fabric
//! request/response/event envelopes, and the error taxonomy.

pub mod error;
pub mod fabric;
pub mod host;
pub mod provider;
pub mod tool;
pub mod types;
