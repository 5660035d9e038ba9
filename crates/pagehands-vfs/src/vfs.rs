//! The VFS operation surface.
//!
//! One instance per page worker. Dispatches each operation to the backing
//! store for the parsed path kind: the live page document, the console
//! ring, session artifacts, or the persistent domain store. All results
//! serialize to the JSON payloads handed back to the model.

use std::sync::Arc;

use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::debug;

use pagehands_protocols::error::VfsError;
use pagehands_protocols::fabric::{ArtifactKind, VfsFileInfo};
use pagehands_protocols::host::MainWorldExecutor;
use pagehands_protocols::types::PageLocation;

use crate::console::ConsoleBuffer;
use crate::page::PageDocument;
use crate::path::{parse_path, PathKind, VirtualPath};
use crate::route::RoutePattern;
use crate::session::SessionArtifacts;
use crate::store::{DomainState, DomainStore};

/// Reads larger than this are rejected with advice to grep or slice.
pub const MAX_READ_CHARS: usize = 15_000;

const MAX_GREP_MATCHES: usize = 30;
const MAX_GREP_LINE_CHARS: usize = 250;
const DEFAULT_GREP_CONTEXT: usize = 2;

#[derive(Debug, Clone, Serialize)]
pub struct ReadResult {
    pub content: String,
    pub version: u64,
    /// Total line count of the unsliced content.
    pub lines: usize,
    pub path: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct WriteResult {
    pub version: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct EditResult {
    pub version: u64,
    pub replacements: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LsEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl LsEntry {
    fn file(name: impl Into<String>, version: u64) -> Self {
        Self {
            name: name.into(),
            entry_type: "file",
            version: Some(version),
        }
    }

    fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry_type: "directory",
            version: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GrepMatch {
    pub path: String,
    pub line_number: usize,
    pub line: String,
    pub context: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GrepOutput {
    pub matches: Vec<GrepMatch>,
    pub count: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GrepCountOutput {
    pub count: usize,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct Vfs {
    location: PageLocation,
    page: Arc<PageDocument>,
    console: Arc<ConsoleBuffer>,
    session: Arc<SessionArtifacts>,
    store: DomainStore,
    executor: Arc<dyn MainWorldExecutor>,
    /// Page-worker-side snapshot of the domain state; dirtied on local
    /// mutation and on invalidation messages from the background.
    cache: Mutex<Option<DomainState>>,
}

impl Vfs {
    pub fn new(
        page: Arc<PageDocument>,
        console: Arc<ConsoleBuffer>,
        session: Arc<SessionArtifacts>,
        store: DomainStore,
        executor: Arc<dyn MainWorldExecutor>,
    ) -> Self {
        Self {
            location: page.location().clone(),
            page,
            console,
            session,
            store,
            executor,
            cache: Mutex::new(None),
        }
    }

    pub fn location(&self) -> &PageLocation {
        &self.location
    }

    pub fn page(&self) -> &Arc<PageDocument> {
        &self.page
    }

    pub fn console(&self) -> &Arc<ConsoleBuffer> {
        &self.console
    }

    pub fn store(&self) -> &DomainStore {
        &self.store
    }

    /// Drop the cached domain state. The background sends this after
    /// imports and copies; local mutations call it directly.
    pub fn invalidate_cache(&self) {
        *self.cache.lock() = None;
    }

    async fn domain_state(&self) -> Result<DomainState, VfsError> {
        if let Some(state) = self.cache.lock().clone() {
            return Ok(state);
        }
        let state = self.store.load(&self.location.domain).await?;
        *self.cache.lock() = Some(state.clone());
        Ok(state)
    }

    fn parse(&self, path: &str) -> Result<VirtualPath, VfsError> {
        parse_path(path, &self.location)
            .ok_or_else(|| VfsError::InvalidPath(path.to_string()))
    }

    fn check_domain(&self, vp: &VirtualPath) -> Result<(), VfsError> {
        if vp.domain != self.location.domain {
            return Err(VfsError::PermissionDenied(format!(
                "path domain {} does not match page domain {}",
                vp.domain, self.location.domain
            )));
        }
        Ok(())
    }

    /// Live-page leaves only exist for the active urlPath.
    fn check_active(&self, vp: &VirtualPath) -> Result<(), VfsError> {
        if vp.url_path != self.location.url_path {
            return Err(VfsError::NotFound(format!("no live page at {}", vp.full)));
        }
        Ok(())
    }

    pub async fn read(
        &self,
        path: &str,
        offset: Option<usize>,
        limit: Option<usize>,
    ) -> Result<ReadResult, VfsError> {
        let vp = self.parse(path)?;
        self.check_domain(&vp)?;

        let (content, version) = match vp.kind {
            PathKind::Page => {
                self.check_active(&vp)?;
                self.page.read_formatted()
            }
            PathKind::Console => {
                self.check_active(&vp)?;
                (self.console.formatted(), self.console.version())
            }
            PathKind::Screenshot => {
                self.check_active(&vp)?;
                let shot = self
                    .session
                    .screenshot(&self.location)
                    .ok_or_else(|| VfsError::NotFound(vp.full.clone()))?;
                (shot.content, shot.version)
            }
            PathKind::Plan => {
                self.check_active(&vp)?;
                let plan = self
                    .session
                    .plan(&self.location)
                    .ok_or_else(|| VfsError::NotFound(vp.full.clone()))?;
                (plan.content, plan.version)
            }
            PathKind::Script | PathKind::Style => {
                let name = vp.file_name.clone().unwrap_or_default();
                let kind = artifact_kind(vp.kind);
                let (_, file) = self
                    .store
                    .get_file(&vp.domain, &vp.url_path, kind, &name)
                    .await?
                    .ok_or_else(|| VfsError::NotFound(vp.full.clone()))?;
                (file.content, file.version)
            }
            PathKind::ScriptsDir | PathKind::StylesDir | PathKind::Directory => {
                return Err(VfsError::InvalidPath(format!("{} is a directory", vp.full)));
            }
        };

        let total_lines = content.lines().count();
        let content = slice_lines(&content, offset, limit);

        if vp.kind != PathKind::Screenshot {
            let chars = content.chars().count();
            if chars > MAX_READ_CHARS {
                return Err(VfsError::ContentTooLarge {
                    chars,
                    limit: MAX_READ_CHARS,
                });
            }
        }

        Ok(ReadResult {
            content,
            version,
            lines: total_lines,
            path: vp.full,
        })
    }

    pub async fn write(
        &self,
        path: &str,
        content: &str,
        expected_version: u64,
    ) -> Result<WriteResult, VfsError> {
        let vp = self.parse(path)?;
        self.check_domain(&vp)?;

        let version = match vp.kind {
            PathKind::Page => {
                self.check_active(&vp)?;
                self.page.write_html(content, expected_version)?
            }
            PathKind::Plan => {
                self.check_active(&vp)?;
                self.session
                    .write_plan(&self.location, content.to_string(), expected_version)?
            }
            PathKind::Script | PathKind::Style => {
                let name = vp.file_name.clone().unwrap_or_default();
                let kind = artifact_kind(vp.kind);
                let version = self
                    .store
                    .write_file(
                        &vp.domain,
                        &vp.url_path,
                        kind,
                        &name,
                        content.to_string(),
                        expected_version,
                    )
                    .await?;
                self.invalidate_cache();
                if vp.kind == PathKind::Style && self.applies_to_active(&vp.url_path) {
                    self.page.inject_style(&name, content);
                }
                version
            }
            PathKind::Console => {
                return Err(VfsError::PermissionDenied(
                    "console.log is read-only".to_string(),
                ));
            }
            PathKind::Screenshot => {
                return Err(VfsError::PermissionDenied(
                    "screenshot.png is produced by capture, not written".to_string(),
                ));
            }
            PathKind::ScriptsDir | PathKind::StylesDir | PathKind::Directory => {
                return Err(VfsError::InvalidPath(format!("{} is a directory", vp.full)));
            }
        };

        debug!(path = %vp.full, version, "write");
        Ok(WriteResult { version })
    }

    pub async fn edit(
        &self,
        path: &str,
        old: &str,
        new: &str,
        expected_version: u64,
        replace_all: bool,
    ) -> Result<EditResult, VfsError> {
        let vp = self.parse(path)?;
        self.check_domain(&vp)?;

        match vp.kind {
            PathKind::Page => {
                self.check_active(&vp)?;
                let outcome = self.page.edit(old, new, expected_version, replace_all)?;
                self.store
                    .append_edit_record(
                        &self.location.domain,
                        &self.location.url_path,
                        outcome.record,
                    )
                    .await?;
                self.invalidate_cache();
                Ok(EditResult {
                    version: outcome.version,
                    replacements: outcome.replacements,
                })
            }
            PathKind::Script | PathKind::Style => {
                let name = vp.file_name.clone().unwrap_or_default();
                let kind = artifact_kind(vp.kind);
                let (_, file) = self
                    .store
                    .get_file(&vp.domain, &vp.url_path, kind, &name)
                    .await?
                    .ok_or_else(|| VfsError::NotFound(vp.full.clone()))?;
                let (content, replacements) =
                    replace_in_text(&file.content, old, new, replace_all, &vp.full)?;
                let version = self
                    .store
                    .write_file(&vp.domain, &vp.url_path, kind, &name, content.clone(), expected_version)
                    .await?;
                self.invalidate_cache();
                if vp.kind == PathKind::Style && self.applies_to_active(&vp.url_path) {
                    self.page.inject_style(&name, &content);
                }
                Ok(EditResult {
                    version,
                    replacements,
                })
            }
            PathKind::Plan => {
                self.check_active(&vp)?;
                let plan = self
                    .session
                    .plan(&self.location)
                    .ok_or_else(|| VfsError::NotFound(vp.full.clone()))?;
                let (content, replacements) =
                    replace_in_text(&plan.content, old, new, replace_all, &vp.full)?;
                let version = self
                    .session
                    .write_plan(&self.location, content, expected_version)?;
                Ok(EditResult {
                    version,
                    replacements,
                })
            }
            PathKind::Console | PathKind::Screenshot => Err(VfsError::PermissionDenied(format!(
                "{} cannot be edited",
                vp.full
            ))),
            PathKind::ScriptsDir | PathKind::StylesDir | PathKind::Directory => {
                Err(VfsError::InvalidPath(format!("{} is a directory", vp.full)))
            }
        }
    }

    pub async fn ls(&self, path: Option<&str>) -> Result<Vec<LsEntry>, VfsError> {
        let vp = match path {
            None => None,
            Some(p) => {
                let vp = self.parse(p)?;
                self.check_domain(&vp)?;
                Some(vp)
            }
        };

        match vp {
            None => self.ls_current_dir().await,
            Some(vp) => match vp.kind {
                PathKind::ScriptsDir | PathKind::StylesDir => {
                    let kind = if vp.kind == PathKind::ScriptsDir {
                        ArtifactKind::Script
                    } else {
                        ArtifactKind::Style
                    };
                    let state = self.domain_state().await?;
                    let target = PageLocation::new(vp.domain.clone(), &vp.url_path);
                    Ok(resolved_entries(&state, &target, kind))
                }
                PathKind::Directory => {
                    if vp.url_path == self.location.url_path {
                        self.ls_current_dir().await
                    } else {
                        Ok(vec![
                            LsEntry::directory("scripts"),
                            LsEntry::directory("styles"),
                        ])
                    }
                }
                _ => Err(VfsError::InvalidPath(format!(
                    "{} is not a directory",
                    vp.full
                ))),
            },
        }
    }

    async fn ls_current_dir(&self) -> Result<Vec<LsEntry>, VfsError> {
        let mut entries = vec![
            LsEntry::file("page.html", self.page.version()),
            LsEntry::file("console.log", self.console.version()),
        ];
        if let Some(shot) = self.session.screenshot(&self.location) {
            entries.push(LsEntry::file("screenshot.png", shot.version));
        }
        if let Some(plan) = self.session.plan(&self.location) {
            entries.push(LsEntry::file("plan.md", plan.version));
        }
        entries.push(LsEntry::directory("scripts"));
        entries.push(LsEntry::directory("styles"));
        Ok(entries)
    }

    pub async fn glob(&self, pattern: &str) -> Result<Vec<String>, VfsError> {
        let base = self.location.base_dir();
        let full_pattern = if pattern.starts_with('/') {
            pattern.to_string()
        } else {
            format!("{base}/{pattern}")
        };
        let regex = glob_to_regex(&full_pattern)
            .map_err(|_| VfsError::InvalidPath(format!("bad glob pattern: {pattern}")))?;

        let state = self.domain_state().await?;
        let mut candidates = vec![format!("{base}/page.html")];
        for (kind, dir) in [(ArtifactKind::Script, "scripts"), (ArtifactKind::Style, "styles")] {
            for entry in resolved_entries(&state, &self.location, kind) {
                candidates.push(format!("{base}/{dir}/{}", entry.name));
            }
        }

        Ok(candidates
            .into_iter()
            .filter(|c| regex.is_match(c))
            .collect())
    }

    pub async fn grep(
        &self,
        pattern: &str,
        path: Option<&str>,
        context_lines: Option<usize>,
    ) -> Result<GrepOutput, VfsError> {
        let regex = search_regex(pattern)?;
        let context = context_lines.unwrap_or(DEFAULT_GREP_CONTEXT);
        let targets = self.search_targets(path).await?;

        let mut matches = Vec::new();
        let mut count = 0;
        for (target_path, content) in &targets {
            let lines: Vec<&str> = content.lines().collect();
            for (index, line) in lines.iter().enumerate() {
                if !regex.is_match(line) {
                    continue;
                }
                count += 1;
                if matches.len() >= MAX_GREP_MATCHES {
                    continue;
                }
                let from = index.saturating_sub(context);
                let to = (index + context + 1).min(lines.len());
                let surrounding: Vec<String> = (from..to)
                    .filter(|&i| i != index)
                    .map(|i| truncate_line(lines[i]))
                    .collect();
                matches.push(GrepMatch {
                    path: target_path.clone(),
                    line_number: index + 1,
                    line: truncate_line(line),
                    context: surrounding,
                });
            }
        }

        let truncated = count > matches.len();
        let message = truncated.then(|| {
            format!(
                "Showing the first {} of {count} matches; narrow the pattern",
                matches.len()
            )
        });
        Ok(GrepOutput {
            matches,
            count,
            truncated,
            message,
        })
    }

    pub async fn grep_count(
        &self,
        pattern: &str,
        path: Option<&str>,
    ) -> Result<GrepCountOutput, VfsError> {
        let regex = search_regex(pattern)?;
        let targets = self.search_targets(path).await?;
        let count = targets
            .iter()
            .map(|(_, content)| content.lines().filter(|l| regex.is_match(l)).count())
            .sum();
        let path = path
            .map(str::to_string)
            .unwrap_or_else(|| self.location.base_dir());
        Ok(GrepCountOutput { count, path })
    }

    async fn search_targets(
        &self,
        path: Option<&str>,
    ) -> Result<Vec<(String, String)>, VfsError> {
        match path {
            Some(p) => {
                let vp = self.parse(p)?;
                self.check_domain(&vp)?;
                if !vp.kind.is_file() {
                    return Err(VfsError::InvalidPath(format!(
                        "{} is a directory",
                        vp.full
                    )));
                }
                let content = self.raw_content(&vp).await?;
                Ok(vec![(vp.full, content)])
            }
            None => {
                let base = self.location.base_dir();
                let (page_content, _) = self.page.read_formatted();
                let mut targets = vec![(format!("{base}/page.html"), page_content)];
                let state = self.domain_state().await?;
                for (kind, dir) in
                    [(ArtifactKind::Script, "scripts"), (ArtifactKind::Style, "styles")]
                {
                    for (_, name, file) in
                        DomainStore::matching_files(&state, &self.location, kind)
                    {
                        targets.push((format!("{base}/{dir}/{name}"), file.content));
                    }
                }
                if let Some(plan) = self.session.plan(&self.location) {
                    targets.push((format!("{base}/plan.md"), plan.content));
                }
                Ok(targets)
            }
        }
    }

    /// File content without the read guard, for search.
    async fn raw_content(&self, vp: &VirtualPath) -> Result<String, VfsError> {
        match vp.kind {
            PathKind::Page => {
                self.check_active(vp)?;
                Ok(self.page.read_formatted().0)
            }
            PathKind::Console => {
                self.check_active(vp)?;
                Ok(self.console.formatted())
            }
            PathKind::Screenshot => {
                self.check_active(vp)?;
                Ok(self
                    .session
                    .screenshot(&self.location)
                    .map(|a| a.content)
                    .unwrap_or_default())
            }
            PathKind::Plan => {
                self.check_active(vp)?;
                Ok(self
                    .session
                    .plan(&self.location)
                    .map(|a| a.content)
                    .unwrap_or_default())
            }
            PathKind::Script | PathKind::Style => {
                let name = vp.file_name.clone().unwrap_or_default();
                let kind = artifact_kind(vp.kind);
                Ok(self
                    .store
                    .get_file(&vp.domain, &vp.url_path, kind, &name)
                    .await?
                    .map(|(_, f)| f.content)
                    .ok_or_else(|| VfsError::NotFound(vp.full.clone()))?)
            }
            _ => Err(VfsError::InvalidPath(vp.full.clone())),
        }
    }

    pub async fn delete_file(&self, kind: ArtifactKind, name: &str) -> Result<bool, VfsError> {
        let removed = self
            .store
            .delete_file(&self.location.domain, &self.location.url_path, kind, name)
            .await?;
        self.invalidate_cache();
        if removed && kind == ArtifactKind::Style {
            self.page.remove_style(name);
        }
        Ok(removed)
    }

    /// Run a stored script in the page's principal world.
    pub async fn exec(&self, script_path: &str) -> Result<ExecOutcome, VfsError> {
        let vp = self.parse(script_path)?;
        self.check_domain(&vp)?;
        if vp.kind != PathKind::Script {
            return Err(VfsError::InvalidPath(format!(
                "Exec requires a script path, got {}",
                vp.full
            )));
        }
        let name = vp.file_name.clone().unwrap_or_default();
        let (_, file) = self
            .store
            .get_file(&vp.domain, &vp.url_path, ArtifactKind::Script, &name)
            .await?
            .ok_or_else(|| VfsError::NotFound(vp.full.clone()))?;

        let outcome = self.executor.execute(&file.content).await;
        let error = if !outcome.success && outcome.is_csp_blocked() {
            outcome.error.map(|e| {
                format!(
                    "{e}. The page's Content Security Policy blocks inline evaluation; \
                     saved scripts run through user-script registration on page load instead"
                )
            })
        } else {
            outcome.error
        };
        Ok(ExecOutcome {
            success: outcome.success,
            result: outcome.result,
            error,
        })
    }

    /// Run an inline code string in the page's principal world.
    pub async fn exec_inline(&self, code: &str) -> ExecOutcome {
        let outcome = self.executor.execute(code).await;
        ExecOutcome {
            success: outcome.success,
            result: outcome.result,
            error: outcome.error,
        }
    }

    /// Inject every stored style matching the active page. Called on page
    /// load; idempotent per style name.
    pub async fn inject_styles_on_load(&self) -> Result<usize, VfsError> {
        let state = self.domain_state().await?;
        let mut injected = 0;
        let mut seen = std::collections::HashSet::new();
        for (_, name, file) in
            DomainStore::matching_files(&state, &self.location, ArtifactKind::Style)
        {
            if seen.insert(name.clone()) {
                self.page.inject_style(&name, &file.content);
                injected += 1;
            }
        }
        Ok(injected)
    }

    /// Store a fresh capture for the active page. Returns (path, version).
    pub fn store_screenshot(&self, data_url: String) -> (String, u64) {
        let version = self.session.store_screenshot(&self.location, data_url);
        (format!("{}/screenshot.png", self.location.base_dir()), version)
    }

    /// Every stored file for the page's domain.
    pub async fn list_files(&self) -> Result<Vec<VfsFileInfo>, VfsError> {
        self.store.list_domain_files(&self.location.domain).await
    }

    /// Whether a stored urlPath applies to the active page.
    fn applies_to_active(&self, url_path: &str) -> bool {
        if url_path == self.location.url_path {
            return true;
        }
        RoutePattern::compile(url_path)
            .is_some_and(|p| p.matches(&self.location.url_path))
    }
}

fn artifact_kind(kind: PathKind) -> ArtifactKind {
    match kind {
        PathKind::Script => ArtifactKind::Script,
        _ => ArtifactKind::Style,
    }
}

fn resolved_entries(
    state: &DomainState,
    target: &PageLocation,
    kind: ArtifactKind,
) -> Vec<LsEntry> {
    let mut seen = std::collections::HashSet::new();
    DomainStore::matching_files(state, target, kind)
        .into_iter()
        .filter(|(_, name, _)| seen.insert(name.clone()))
        .map(|(_, name, file)| LsEntry::file(name, file.version))
        .collect()
}

fn slice_lines(content: &str, offset: Option<usize>, limit: Option<usize>) -> String {
    if offset.is_none() && limit.is_none() {
        return content.to_string();
    }
    let lines: Vec<&str> = content.lines().collect();
    let from = offset.unwrap_or(0);
    if from >= lines.len() {
        return String::new();
    }
    let to = limit.map_or(lines.len(), |l| (from + l).min(lines.len()));
    lines[from..to].join("\n")
}

/// Case-insensitive search regex; an invalid pattern degrades to a
/// literal. Even the escaped literal can fail to compile (regex size
/// limits), so that path propagates too.
fn search_regex(pattern: &str) -> Result<Regex, VfsError> {
    let build = |source: &str| {
        RegexBuilder::new(source)
            .case_insensitive(true)
            .build()
    };
    build(pattern)
        .or_else(|_| build(&regex::escape(pattern)))
        .map_err(|e| VfsError::InvalidPath(format!("unusable search pattern: {e}")))
}

fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut source = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            c => source.push_str(&regex::escape(&c.to_string())),
        }
    }
    source.push('$');
    Regex::new(&source)
}

fn truncate_line(line: &str) -> String {
    if line.chars().count() <= MAX_GREP_LINE_CHARS {
        line.to_string()
    } else {
        let prefix: String = line.chars().take(MAX_GREP_LINE_CHARS).collect();
        format!("{prefix}…")
    }
}

fn replace_in_text(
    content: &str,
    old: &str,
    new: &str,
    replace_all: bool,
    path: &str,
) -> Result<(String, usize), VfsError> {
    let count = content.matches(old).count();
    if count == 0 {
        return Err(VfsError::NotFound(format!(
            "old_string not found in {path}"
        )));
    }
    if replace_all {
        Ok((content.replace(old, new), count))
    } else {
        Ok((content.replacen(old, new, 1), 1))
    }
}

#[cfg(test)]
#[path = "vfs_tests.rs"]
mod tests;
