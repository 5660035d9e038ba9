//! Virtual path parsing and resolution.
//!
//! Paths have the shape `/{domain}/{urlPath}/{leaf}` where the leaf is one
//! of `page.html`, `console.log`, `screenshot.png`, `plan.md`,
//! `scripts/<name>.js`, or `styles/<name>.css`. Relative paths (`./`,
//! `../`) and bare leaves resolve against the active page's directory.

use serde::{Deserialize, Serialize};

use pagehands_protocols::types::{normalize_url_path, PageLocation};

/// What a parsed path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    Page,
    Console,
    Screenshot,
    Plan,
    Script,
    Style,
    ScriptsDir,
    StylesDir,
    Directory,
}

impl PathKind {
    pub fn is_file(&self) -> bool {
        !matches!(
            self,
            PathKind::ScriptsDir | PathKind::StylesDir | PathKind::Directory
        )
    }
}

/// A parsed virtual path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualPath {
    pub domain: String,
    pub url_path: String,
    pub kind: PathKind,
    /// File name for script/style leaves (`a.js`, `dark.css`).
    pub file_name: Option<String>,
    /// Canonical absolute form.
    pub full: String,
}

/// Parse a path string, resolving relative forms against `location`.
///
/// Returns `None` when the string cannot name anything in the VFS.
pub fn parse_path(input: &str, location: &PageLocation) -> Option<VirtualPath> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let absolute = if input.starts_with('/') {
        input.to_string()
    } else {
        // `./x`, `../x`, and bare leaves all resolve against the page dir.
        format!("{}/{}", location.base_dir(), input)
    };

    let segments = resolve_segments(&absolute)?;
    let domain = segments.first()?.clone();
    if domain.is_empty() {
        return None;
    }
    let rest = &segments[1..];

    let (kind, file_name, url_segments): (PathKind, Option<String>, &[String]) = match rest {
        [] => (PathKind::Directory, None, rest),
        [.., last] => {
            let n = rest.len();
            match last.as_str() {
                "page.html" => (PathKind::Page, Some(last.clone()), &rest[..n - 1]),
                "console.log" => (PathKind::Console, Some(last.clone()), &rest[..n - 1]),
                "screenshot.png" => (PathKind::Screenshot, Some(last.clone()), &rest[..n - 1]),
                "plan.md" => (PathKind::Plan, Some(last.clone()), &rest[..n - 1]),
                "scripts" => (PathKind::ScriptsDir, None, &rest[..n - 1]),
                "styles" => (PathKind::StylesDir, None, &rest[..n - 1]),
                name => {
                    let parent = (n >= 2).then(|| rest[n - 2].as_str());
                    if parent == Some("scripts") && is_artifact_name(name, ".js") {
                        (PathKind::Script, Some(last.clone()), &rest[..n - 2])
                    } else if parent == Some("styles") && is_artifact_name(name, ".css") {
                        (PathKind::Style, Some(last.clone()), &rest[..n - 2])
                    } else {
                        (PathKind::Directory, None, rest)
                    }
                }
            }
        }
    };

    let url_path = normalize_url_path(&url_segments.join("/"));
    let full = rebuild_full(&domain, &url_path, kind, file_name.as_deref());

    Some(VirtualPath {
        domain,
        url_path,
        kind,
        file_name,
        full,
    })
}

/// Split an absolute path into segments, resolving `.` and `..`.
/// Traversal above the root drops the extra `..` segments.
fn resolve_segments(path: &str) -> Option<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            s => out.push(s.to_string()),
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn is_artifact_name(name: &str, extension: &str) -> bool {
    name.len() > extension.len() && name.ends_with(extension) && !name.contains('/')
}

fn rebuild_full(domain: &str, url_path: &str, kind: PathKind, file_name: Option<&str>) -> String {
    let dir = if url_path == "/" {
        format!("/{domain}")
    } else {
        format!("/{domain}{url_path}")
    };
    match kind {
        PathKind::Script => format!("{dir}/scripts/{}", file_name.unwrap_or_default()),
        PathKind::Style => format!("{dir}/styles/{}", file_name.unwrap_or_default()),
        PathKind::ScriptsDir => format!("{dir}/scripts"),
        PathKind::StylesDir => format!("{dir}/styles"),
        PathKind::Directory => dir,
        _ => format!("{dir}/{}", file_name.unwrap_or_default()),
    }
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
