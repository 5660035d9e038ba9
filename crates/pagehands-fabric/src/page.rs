//! Per-tab page workers and the background-to-page transport.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use tracing::{debug, warn};

use pagehands_protocols::error::{FabricError, VfsError};
use pagehands_protocols::fabric::{PageRequest, PageResponse};
use pagehands_protocols::host::{ImageFormat, MainWorldExecutor, ScreenCapture};
use pagehands_protocols::types::{PageLocation, TabId};

use pagehands_lifecycle::inject_matching_scripts;
use pagehands_vfs::{ConsoleBuffer, DomainStore, PageDocument, SessionArtifacts, Vfs};

/// The VFS host for one page.
pub struct PageWorker {
    vfs: Vfs,
    capture: Arc<dyn ScreenCapture>,
}

impl PageWorker {
    /// Attach to a freshly loaded page: build the document, inject
    /// matching styles, and, when the host lacks a persistent
    /// user-script facility, run matching scripts one-shot.
    pub async fn attach(
        html: &str,
        url: &str,
        store: DomainStore,
        session: Arc<SessionArtifacts>,
        executor: Arc<dyn MainWorldExecutor>,
        capture: Arc<dyn ScreenCapture>,
        has_persistent_registration: bool,
    ) -> Result<Self, FabricError> {
        let location = PageLocation::from_url(url)
            .ok_or_else(|| FabricError::Internal(format!("unparseable url: {url}")))?;
        let page = Arc::new(PageDocument::new(html, location.clone()));
        let console = Arc::new(ConsoleBuffer::new());
        let vfs = Vfs::new(page, console, session, store.clone(), executor.clone());

        let injected = vfs.inject_styles_on_load().await?;
        debug!(domain = %location.domain, injected, "styles injected on load");

        if !has_persistent_registration {
            let report = inject_matching_scripts(&store, &location, executor.as_ref()).await?;
            if !report.failures.is_empty() {
                warn!(
                    failures = report.failures.len(),
                    "one-shot script injection had failures"
                );
            }
        }

        Ok(Self { vfs, capture })
    }

    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    /// Handle a one-shot request from the background. VFS errors are
    /// folded into tool payloads; only transport-level problems surface
    /// as fabric errors upstream.
    pub async fn handle(&self, request: PageRequest) -> PageResponse {
        match request {
            PageRequest::Tool { name, input } => PageResponse::Tool {
                result: self.run_tool(&name, &input).await,
            },
            PageRequest::ListFiles => {
                let files = self.vfs.list_files().await.unwrap_or_else(|err| {
                    warn!(%err, "file listing failed");
                    Vec::new()
                });
                PageResponse::Files { files }
            }
            PageRequest::InvalidateVfsCache => {
                self.vfs.invalidate_cache();
                PageResponse::Ack
            }
            PageRequest::DeleteFile { kind, name } => {
                let removed = self.vfs.delete_file(kind, &name).await.unwrap_or(false);
                PageResponse::Deleted { removed }
            }
            PageRequest::ToggleFileEnabled { kind, name } => {
                let location = self.vfs.location().clone();
                let enabled = self
                    .vfs
                    .store()
                    .toggle_enabled(&location.domain, &location.url_path, kind, &name)
                    .await
                    .unwrap_or(false);
                self.vfs.invalidate_cache();
                PageResponse::Toggled { enabled }
            }
        }
    }

    async fn run_tool(&self, name: &str, input: &Value) -> Value {
        match self.dispatch_tool(name, input).await {
            Ok(value) => value,
            Err(err) => err.to_payload(),
        }
    }

    async fn dispatch_tool(&self, name: &str, input: &Value) -> Result<Value, VfsError> {
        let path = |key: &str| input.get(key).and_then(Value::as_str).unwrap_or_default();
        match name {
            "Read" => {
                let result = self
                    .vfs
                    .read(
                        path("path"),
                        read_usize(input, "offset"),
                        read_usize(input, "limit"),
                    )
                    .await?;
                to_value(&result)
            }
            "Write" => {
                let result = self
                    .vfs
                    .write(path("path"), path("content"), read_version(input))
                    .await?;
                to_value(&result)
            }
            "Edit" => {
                let result = self
                    .vfs
                    .edit(
                        path("path"),
                        path("old_string"),
                        path("new_string"),
                        read_version(input),
                        input
                            .get("replace_all")
                            .and_then(Value::as_bool)
                            .unwrap_or(false),
                    )
                    .await?;
                to_value(&result)
            }
            "Ls" => {
                let entries = self
                    .vfs
                    .ls(input.get("path").and_then(Value::as_str))
                    .await?;
                Ok(json!({ "entries": entries }))
            }
            "Glob" => {
                let paths = self.vfs.glob(path("pattern")).await?;
                Ok(json!({ "paths": paths }))
            }
            "Grep" => {
                let result = self
                    .vfs
                    .grep(
                        path("pattern"),
                        input.get("path").and_then(Value::as_str),
                        read_usize(input, "context_lines"),
                    )
                    .await?;
                to_value(&result)
            }
            "GrepCount" => {
                let result = self
                    .vfs
                    .grep_count(path("pattern"), input.get("path").and_then(Value::as_str))
                    .await?;
                to_value(&result)
            }
            "Bash" => {
                let command = path("command");
                let outcome = match command.strip_prefix("exec ") {
                    Some(script_path) => self.vfs.exec(script_path.trim()).await?,
                    None => self.vfs.exec_inline(command).await,
                };
                to_value(&outcome)
            }
            "Screenshot" => {
                let format = match input.get("format").and_then(Value::as_str) {
                    Some("jpeg") => ImageFormat::Jpeg,
                    _ => ImageFormat::Png,
                };
                let quality = read_usize(input, "quality").map(|q| q.min(100) as u8);
                let data_url = self
                    .capture
                    .capture(format, quality)
                    .await
                    .map_err(VfsError::Store)?;
                let (path, version) = self.vfs.store_screenshot(data_url);
                Ok(json!({ "path": path, "version": version }))
            }
            other => Err(VfsError::InvalidPath(format!("unknown tool {other}"))),
        }
    }
}

fn read_usize(input: &Value, key: &str) -> Option<usize> {
    input.get(key).and_then(Value::as_u64).map(|v| v as usize)
}

fn read_version(input: &Value) -> u64 {
    input
        .get("expected_version")
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, VfsError> {
    serde_json::to_value(value).map_err(|e| VfsError::Store(e.to_string()))
}

/// One-shot request channel from the background to a tab's page worker.
#[async_trait]
pub trait PageTransport: Send + Sync {
    /// Deliver a request. `NoReceiver` means the page worker is not
    /// injected yet.
    async fn request(
        &self,
        tab_id: TabId,
        request: PageRequest,
    ) -> Result<PageResponse, FabricError>;

    /// Inject the page worker into a tab. Fails with `PrivilegedPage` on
    /// pages the host won't script.
    async fn inject(&self, tab_id: TabId) -> Result<(), FabricError>;
}

/// Deliver with the standard recovery: on `NoReceiver`, inject the page
/// worker and retry once; a second failure is user-facing.
pub async fn send_to_page(
    transport: &dyn PageTransport,
    tab_id: TabId,
    request: PageRequest,
) -> Result<PageResponse, FabricError> {
    match transport.request(tab_id, request.clone()).await {
        Err(FabricError::NoReceiver(_)) => {
            debug!(tab_id, "no receiver; injecting page worker and retrying");
            transport.inject(tab_id).await?;
            transport.request(tab_id, request).await
        }
        other => other,
    }
}

enum PageSlot {
    /// A page has loaded but the worker is not injected yet.
    Pending { html: String, url: String },
    Injected(Arc<PageWorker>),
}

/// In-process transport hosting the page workers directly. Tabs are
/// registered as pages load; privileged tabs are simply never registered.
pub struct InProcessPageTransport {
    store: DomainStore,
    session: Arc<SessionArtifacts>,
    executor: Arc<dyn MainWorldExecutor>,
    capture: Arc<dyn ScreenCapture>,
    has_persistent_registration: bool,
    pages: DashMap<TabId, PageSlot>,
}

impl InProcessPageTransport {
    pub fn new(
        store: DomainStore,
        session: Arc<SessionArtifacts>,
        executor: Arc<dyn MainWorldExecutor>,
        capture: Arc<dyn ScreenCapture>,
        has_persistent_registration: bool,
    ) -> Self {
        Self {
            store,
            session,
            executor,
            capture,
            has_persistent_registration,
            pages: DashMap::new(),
        }
    }

    /// A page loaded in a tab, worker not yet injected.
    pub fn register_tab(&self, tab_id: TabId, html: &str, url: &str) {
        self.pages.insert(
            tab_id,
            PageSlot::Pending {
                html: html.to_string(),
                url: url.to_string(),
            },
        );
    }

    /// Register and inject in one step.
    pub async fn attach_tab(&self, tab_id: TabId, html: &str, url: &str) -> Result<(), FabricError> {
        self.register_tab(tab_id, html, url);
        self.inject(tab_id).await
    }

    /// The worker for a tab, if injected.
    pub fn worker(&self, tab_id: TabId) -> Option<Arc<PageWorker>> {
        self.pages.get(&tab_id).and_then(|slot| match slot.value() {
            PageSlot::Injected(worker) => Some(worker.clone()),
            PageSlot::Pending { .. } => None,
        })
    }

    /// Every registered tab id.
    pub fn tab_ids(&self) -> Vec<TabId> {
        self.pages.iter().map(|e| *e.key()).collect()
    }
}

#[async_trait]
impl PageTransport for InProcessPageTransport {
    async fn request(
        &self,
        tab_id: TabId,
        request: PageRequest,
    ) -> Result<PageResponse, FabricError> {
        let worker = self.worker(tab_id);
        match worker {
            Some(worker) => Ok(worker.handle(request).await),
            None => Err(FabricError::NoReceiver(tab_id)),
        }
    }

    async fn inject(&self, tab_id: TabId) -> Result<(), FabricError> {
        let (html, url) = {
            let slot = self.pages.get(&tab_id);
            match slot.as_deref() {
                None => {
                    return Err(FabricError::PrivilegedPage(format!(
                        "tab {tab_id} has no scriptable page"
                    )))
                }
                Some(PageSlot::Injected(_)) => return Ok(()),
                Some(PageSlot::Pending { html, url }) => (html.clone(), url.clone()),
            }
        };

        let worker = PageWorker::attach(
            &html,
            &url,
            self.store.clone(),
            self.session.clone(),
            self.executor.clone(),
            self.capture.clone(),
            self.has_persistent_registration,
        )
        .await?;
        self.pages
            .insert(tab_id, PageSlot::Injected(Arc::new(worker)));
        Ok(())
    }
}

#[cfg(test)]
#[path = "page_tests.rs"]
mod tests;
