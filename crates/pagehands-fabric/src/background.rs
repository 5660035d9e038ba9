//! The background worker.
//!
//! Holds all per-tab conversation state (history, mode, todos, the
//! awaiting-approval latch, the running agent) so the UI can detach and
//! reattach freely. At most one agent runs per tab: starting a new one
//! aborts the previous run. Storage changes under `vfs:*` are relayed to
//! every connected UI, and the script reconciler re-registers on each.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pagehands_agent::{AgentConfig, AgentEvents, AgentLoop, ToolBridge, TurnContext};
use pagehands_lifecycle::ScriptReconciler;
use pagehands_protocols::error::FabricError;
use pagehands_protocols::fabric::{PageRequest, PageResponse, Request, Response, StreamEvent};
use pagehands_protocols::host::{MainWorldExecutor, ScreenCapture, UserScriptHost};
use pagehands_protocols::provider::LlmProvider;
use pagehands_protocols::types::{AgentMode, Message, TabId, Todo};

use pagehands_vfs::DomainStore;

use crate::keepalive::{KeepAlive, DEFAULT_KEEPALIVE_PERIOD};
use crate::page::{send_to_page, PageTransport};
use crate::port::PortRegistry;

use async_trait::async_trait;
use serde_json::Value;

/// UI-originated page enumeration deadline.
const PAGE_REQUEST_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct BackgroundConfig {
    pub agent: AgentConfig,
    pub keepalive_period: Duration,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            keepalive_period: DEFAULT_KEEPALIVE_PERIOD,
        }
    }
}

#[derive(Default)]
struct TabState {
    history: Mutex<Vec<Message>>,
    todos: Mutex<Vec<Todo>>,
    mode: Mutex<AgentMode>,
    awaiting_approval: Mutex<bool>,
    running: Mutex<Option<RunningAgent>>,
    /// Bumped by CLEAR_HISTORY so a finishing run cannot resurrect a
    /// cleared conversation.
    generation: AtomicU64,
    next_run_id: AtomicU64,
}

struct RunningAgent {
    id: u64,
    cancel: CancellationToken,
}

pub struct Background {
    inner: Arc<Shared>,
}

struct Shared {
    store: DomainStore,
    transport: Arc<dyn PageTransport>,
    provider: Arc<dyn LlmProvider>,
    executor: Arc<dyn MainWorldExecutor>,
    capture: Arc<dyn ScreenCapture>,
    script_host: Arc<dyn UserScriptHost>,
    ports: PortRegistry,
    keepalive: KeepAlive,
    tabs: DashMap<TabId, Arc<TabState>>,
    config: BackgroundConfig,
}

impl Background {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: DomainStore,
        transport: Arc<dyn PageTransport>,
        provider: Arc<dyn LlmProvider>,
        executor: Arc<dyn MainWorldExecutor>,
        capture: Arc<dyn ScreenCapture>,
        script_host: Arc<dyn UserScriptHost>,
        config: BackgroundConfig,
    ) -> Self {
        let keepalive = KeepAlive::new(config.keepalive_period);
        Self {
            inner: Arc::new(Shared {
                store,
                transport,
                provider,
                executor,
                capture,
                script_host,
                ports: PortRegistry::new(),
                keepalive,
                tabs: DashMap::new(),
                config,
            }),
        }
    }

    pub fn ports(&self) -> &PortRegistry {
        &self.inner.ports
    }

    pub fn keepalive_active(&self) -> bool {
        self.inner.keepalive.active()
    }

    /// Spawn the storage-change relay and the script reconciler. Returns
    /// the token that stops both.
    pub fn spawn_services(&self) -> CancellationToken {
        let cancel = CancellationToken::new();

        let reconciler =
            ScriptReconciler::new(self.inner.store.clone(), self.inner.script_host.clone());
        tokio::spawn(reconciler.run(cancel.clone()));

        let shared = self.inner.clone();
        let relay_cancel = cancel.clone();
        tokio::spawn(async move {
            let mut changes = shared.store.kv().changes();
            loop {
                tokio::select! {
                    _ = relay_cancel.cancelled() => break,
                    change = changes.recv() => match change {
                        Ok(change) if change.is_vfs() => {
                            shared.ports.broadcast(StreamEvent::VfsStorageChanged {
                                key: change.key,
                            });
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(_)) => {}
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        });

        cancel
    }

    /// Handle a scalar UI request.
    pub async fn handle(&self, request: Request) -> Result<Response, FabricError> {
        match request {
            Request::ChatMessage { tab_id, content } => {
                self.chat_message(tab_id, content).await?;
                Ok(Response::Ack)
            }
            Request::StopAgent { tab_id } => {
                self.stop_agent(tab_id);
                Ok(Response::Ack)
            }
            Request::ClearHistory { tab_id } => {
                self.clear_history(tab_id);
                Ok(Response::Ack)
            }
            Request::GetHistory { tab_id } => {
                let tab = self.tab(tab_id);
                let messages = tab.history.lock().clone();
                Ok(Response::History { messages })
            }
            Request::SetMode { tab_id, mode } => {
                let tab = self.tab(tab_id);
                *tab.mode.lock() = mode;
                self.emit_mode_changed(tab_id, &tab);
                Ok(Response::Ack)
            }
            Request::GetMode { tab_id } => {
                let tab = self.tab(tab_id);
                let mode = *tab.mode.lock();
                let todos = tab.todos.lock().clone();
                let awaiting_approval = *tab.awaiting_approval.lock();
                Ok(Response::ModeState {
                    mode,
                    todos,
                    awaiting_approval,
                })
            }
            Request::ApprovePlan { tab_id } => {
                self.approve_plan(tab_id).await?;
                Ok(Response::Ack)
            }
            Request::RejectPlan { tab_id, feedback } => {
                self.reject_plan(tab_id, feedback).await?;
                Ok(Response::Ack)
            }
            Request::GetVfsFiles { tab_id } => Ok(self.get_vfs_files(tab_id).await),
            Request::DeleteVfsFile { tab_id, kind, name } => {
                let response = send_to_page(
                    self.inner.transport.as_ref(),
                    tab_id,
                    PageRequest::DeleteFile { kind, name },
                )
                .await?;
                let removed = matches!(response, PageResponse::Deleted { removed: true });
                Ok(Response::Deleted { removed })
            }
            Request::ToggleVfsFileEnabled { tab_id, kind, name } => {
                send_to_page(
                    self.inner.transport.as_ref(),
                    tab_id,
                    PageRequest::ToggleFileEnabled { kind, name },
                )
                .await?;
                Ok(Response::Ack)
            }
            Request::SetAllVfsFilesEnabled { enabled } => {
                self.inner
                    .store
                    .set_all_enabled(enabled)
                    .await
                    .map_err(FabricError::Vfs)?;
                self.invalidate_all_caches().await;
                Ok(Response::Ack)
            }
            Request::CaptureScreenshot { format, quality } => {
                let data_url = self
                    .inner
                    .capture
                    .capture(format, quality)
                    .await
                    .map_err(FabricError::Internal)?;
                Ok(Response::Screenshot { data_url })
            }
            Request::ExecuteInMainWorld { code } => {
                let outcome = self.inner.executor.execute(&code).await;
                Ok(Response::MainWorld { outcome })
            }
            Request::ImportVfsBundle { bundle } => {
                let imported = self.inner.store.import_bundle(&bundle).await?;
                info!(imported, "bundle imported");
                self.invalidate_all_caches().await;
                Ok(Response::Ack)
            }
        }
    }

    fn tab(&self, tab_id: TabId) -> Arc<TabState> {
        self.inner
            .tabs
            .entry(tab_id)
            .or_insert_with(|| Arc::new(TabState::default()))
            .clone()
    }

    async fn chat_message(&self, tab_id: TabId, content: String) -> Result<(), FabricError> {
        let tab = self.tab(tab_id);
        if *tab.awaiting_approval.lock() {
            return Err(FabricError::AwaitingApproval);
        }
        let mode = *tab.mode.lock();
        self.start_agent(tab_id, tab, mode, content);
        Ok(())
    }

    fn stop_agent(&self, tab_id: TabId) {
        let tab = self.tab(tab_id);
        let running = tab.running.lock().take();
        if let Some(running) = running {
            debug!(tab_id, "stopping agent");
            running.cancel.cancel();
        }
    }

    fn clear_history(&self, tab_id: TabId) {
        let tab = self.tab(tab_id);
        if let Some(running) = tab.running.lock().take() {
            running.cancel.cancel();
        }
        tab.generation.fetch_add(1, Ordering::SeqCst);
        tab.history.lock().clear();
        tab.todos.lock().clear();
        *tab.mode.lock() = AgentMode::Plan;
        *tab.awaiting_approval.lock() = false;
        self.emit_mode_changed(tab_id, &tab);
    }

    async fn approve_plan(&self, tab_id: TabId) -> Result<(), FabricError> {
        let tab = self.tab(tab_id);
        if !*tab.awaiting_approval.lock() {
            return Err(FabricError::Internal(
                "no plan awaiting approval".to_string(),
            ));
        }
        *tab.awaiting_approval.lock() = false;
        *tab.mode.lock() = AgentMode::Execute;
        self.emit_mode_changed(tab_id, &tab);

        let plan = self.read_plan(tab_id).await.unwrap_or_default();
        let todos = tab.todos.lock().clone();
        let mut seed = String::from("The plan was approved. Execute it now.\n\nPlan:\n");
        seed.push_str(if plan.is_empty() { "(no plan.md found)" } else { &plan });
        let open: Vec<&Todo> = todos.iter().filter(|t| t.is_open()).collect();
        if !open.is_empty() {
            seed.push_str("\n\nOpen todos:\n");
            for todo in open {
                seed.push_str(&format!("- {}\n", todo.content));
            }
        }

        // Execution starts from a fresh history seeded with the plan.
        tab.generation.fetch_add(1, Ordering::SeqCst);
        tab.history.lock().clear();
        self.start_agent(tab_id, tab, AgentMode::Execute, seed);
        Ok(())
    }

    async fn reject_plan(
        &self,
        tab_id: TabId,
        feedback: Option<String>,
    ) -> Result<(), FabricError> {
        let tab = self.tab(tab_id);
        if !*tab.awaiting_approval.lock() {
            return Err(FabricError::Internal(
                "no plan awaiting approval".to_string(),
            ));
        }
        *tab.awaiting_approval.lock() = false;
        self.emit_mode_changed(tab_id, &tab);

        let message = match feedback {
            Some(feedback) => {
                format!("Please revise the plan based on this feedback: {feedback}")
            }
            None => "Please revise the plan.".to_string(),
        };
        self.start_agent(tab_id, tab, AgentMode::Plan, message);
        Ok(())
    }

    async fn read_plan(&self, tab_id: TabId) -> Option<String> {
        let response = send_to_page(
            self.inner.transport.as_ref(),
            tab_id,
            PageRequest::Tool {
                name: "Read".to_string(),
                input: serde_json::json!({"path": "./plan.md"}),
            },
        )
        .await
        .ok()?;
        match response {
            PageResponse::Tool { result } => result
                .get("content")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    }

    async fn get_vfs_files(&self, tab_id: TabId) -> Response {
        let request = send_to_page(
            self.inner.transport.as_ref(),
            tab_id,
            PageRequest::ListFiles,
        );
        match tokio::time::timeout(PAGE_REQUEST_DEADLINE, request).await {
            Ok(Ok(PageResponse::Files { files })) => Response::VfsFiles { files, error: None },
            Ok(Ok(_)) => Response::VfsFiles {
                files: Vec::new(),
                error: Some("unexpected page response".to_string()),
            },
            Ok(Err(err)) => Response::VfsFiles {
                files: Vec::new(),
                error: Some(err.to_string()),
            },
            Err(_) => Response::VfsFiles {
                files: Vec::new(),
                error: Some(
                    FabricError::Timeout(PAGE_REQUEST_DEADLINE.as_millis() as u64).to_string(),
                ),
            },
        }
    }

    async fn invalidate_all_caches(&self) {
        for entry in self.inner.tabs.iter() {
            let tab_id = *entry.key();
            let _ = self
                .inner
                .transport
                .request(tab_id, PageRequest::InvalidateVfsCache)
                .await;
        }
    }

    fn emit_mode_changed(&self, tab_id: TabId, tab: &TabState) {
        self.inner.ports.send(
            tab_id,
            StreamEvent::ModeChanged {
                tab_id,
                mode: *tab.mode.lock(),
                awaiting_approval: *tab.awaiting_approval.lock(),
            },
        );
    }

    /// Start an agent run, aborting any run already active on the tab.
    fn start_agent(&self, tab_id: TabId, tab: Arc<TabState>, mode: AgentMode, user_message: String) {
        if let Some(previous) = tab.running.lock().take() {
            debug!(tab_id, "aborting previous agent run");
            previous.cancel.cancel();
        }

        let run_id = tab.next_run_id.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        *tab.running.lock() = Some(RunningAgent {
            id: run_id,
            cancel: cancel.clone(),
        });

        let shared = self.inner.clone();
        let generation = tab.generation.load(Ordering::SeqCst);
        let run_cancel = cancel.clone();
        tokio::spawn(async move {
            let _keepalive = shared.keepalive.acquire();

            let events: Arc<dyn AgentEvents> = Arc::new(PortEvents {
                shared: shared.clone(),
                tab: tab.clone(),
            });
            let bridge: Arc<dyn ToolBridge> = Arc::new(TransportBridge {
                transport: shared.transport.clone(),
            });
            let agent = AgentLoop::new(
                shared.provider.clone(),
                bridge,
                events,
                shared.config.agent.clone(),
            );

            let ctx = TurnContext {
                tab_id,
                mode,
                cancel: run_cancel.clone(),
            };
            let mut history = tab.history.lock().clone();
            let mut todos = tab.todos.lock().clone();

            let outcome = agent
                .run_turn(&ctx, user_message, &mut history, &mut todos)
                .await;

            // Write back unless the conversation was cleared mid-run.
            if tab.generation.load(Ordering::SeqCst) == generation {
                *tab.history.lock() = history;
                *tab.todos.lock() = todos;
            }

            if outcome.is_ok() && mode == AgentMode::Plan {
                *tab.awaiting_approval.lock() = true;
                shared.ports.send(
                    tab_id,
                    StreamEvent::ModeChanged {
                        tab_id,
                        mode: *tab.mode.lock(),
                        awaiting_approval: true,
                    },
                );
            }

            // Release the running slot only if a newer run has not
            // replaced this one.
            {
                let mut running = tab.running.lock();
                if running.as_ref().is_some_and(|r| r.id == run_id) {
                    *running = None;
                }
            }

            if let Err(err) = outcome {
                warn!(tab_id, %err, "agent run ended with error");
            }
        });
    }
}

/// Streams agent events to the tab's UI port and mirrors todo updates
/// into the shared tab state.
struct PortEvents {
    shared: Arc<Shared>,
    tab: Arc<TabState>,
}

#[async_trait]
impl AgentEvents for PortEvents {
    async fn assistant_message(&self, tab_id: TabId, message: &Message) {
        self.shared.ports.send(
            tab_id,
            StreamEvent::AgentResponse {
                tab_id,
                message: message.clone(),
            },
        );
    }

    async fn tool_call(&self, tab_id: TabId, id: &str, name: &str, input: &Value) {
        self.shared.ports.send(
            tab_id,
            StreamEvent::ToolCall {
                tab_id,
                id: id.to_string(),
                name: name.to_string(),
                input: input.clone(),
            },
        );
    }

    async fn tool_result(&self, tab_id: TabId, tool_use_id: &str, content: &str, is_error: bool) {
        self.shared.ports.send(
            tab_id,
            StreamEvent::ToolResult {
                tab_id,
                tool_use_id: tool_use_id.to_string(),
                content: content.to_string(),
                is_error,
            },
        );
    }

    async fn todos_updated(&self, tab_id: TabId, todos: &[Todo]) {
        *self.tab.todos.lock() = todos.to_vec();
        self.shared.ports.send(
            tab_id,
            StreamEvent::TodosUpdated {
                tab_id,
                todos: todos.to_vec(),
            },
        );
    }

    async fn done(&self, tab_id: TabId) {
        self.shared
            .ports
            .send(tab_id, StreamEvent::AgentDone { tab_id });
    }

    async fn error(&self, tab_id: TabId, message: &str) {
        self.shared.ports.send(
            tab_id,
            StreamEvent::AgentError {
                tab_id,
                message: message.to_string(),
            },
        );
    }
}

/// Routes page-bound tool calls through the page transport with the
/// standard inject-and-retry recovery.
struct TransportBridge {
    transport: Arc<dyn PageTransport>,
}

#[async_trait]
impl ToolBridge for TransportBridge {
    async fn page_tool(
        &self,
        tab_id: TabId,
        name: &str,
        input: Value,
    ) -> Result<Value, FabricError> {
        let response = send_to_page(
            self.transport.as_ref(),
            tab_id,
            PageRequest::Tool {
                name: name.to_string(),
                input,
            },
        )
        .await?;
        match response {
            PageResponse::Tool { result } => Ok(result),
            other => Err(FabricError::Internal(format!(
                "unexpected page response: {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
#[path = "background_tests.rs"]
mod tests;
