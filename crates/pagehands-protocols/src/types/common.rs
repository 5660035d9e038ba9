//! Common utility types.

use serde::{Deserialize, Serialize};

/// Browser tab identifier.
pub type TabId = u32;

/// Stop reason for a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    StopSequence,
    MaxTokens,
    ToolUse,
}

/// Token usage for a completion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// The location a page worker is attached to: hostname plus normalized
/// pathname.
///
/// `url_path` always starts with `/` and carries no trailing slash except
/// for the root path itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageLocation {
    pub domain: String,
    pub url_path: String,
}

impl PageLocation {
    pub fn new(domain: impl Into<String>, url_path: &str) -> Self {
        Self {
            domain: domain.into(),
            url_path: normalize_url_path(url_path),
        }
    }

    /// Derive a location from a full URL (`https://host/path?query`).
    ///
    /// Query strings and fragments are not part of the virtual path and are
    /// dropped.
    pub fn from_url(url: &str) -> Option<Self> {
        let rest = url.split_once("://").map(|(_, r)| r)?;
        let rest = rest.split(['?', '#']).next().unwrap_or(rest);
        let (host, path) = match rest.split_once('/') {
            Some((host, path)) => (host, format!("/{path}")),
            None => (rest, "/".to_string()),
        };
        if host.is_empty() {
            return None;
        }
        Some(Self::new(host, &path))
    }

    /// The directory all relative and bare paths resolve against:
    /// `/{domain}{url_path}`.
    pub fn base_dir(&self) -> String {
        if self.url_path == "/" {
            format!("/{}", self.domain)
        } else {
            format!("/{}{}", self.domain, self.url_path)
        }
    }
}

/// Normalize a urlPath: leading slash enforced, trailing slashes stripped
/// (root stays `/`).
pub fn normalize_url_path(path: &str) -> String {
    let path = path.trim();
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
#[path = "common_tests.rs"]
mod tests;
