use super::*;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use pagehands_protocols::error::{FabricError, ProviderError};
use pagehands_protocols::types::{MessageContent, Role};

use crate::events::NullEvents;
use crate::provider::MockProvider;

struct RecordingBridge {
    calls: Mutex<Vec<(String, Value)>>,
    response: Value,
}

impl RecordingBridge {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            response: json!({"content": "ok", "version": 1, "lines": 1, "path": "/x.test/page.html"}),
        }
    }
}

#[async_trait]
impl ToolBridge for RecordingBridge {
    async fn page_tool(
        &self,
        _tab_id: TabId,
        name: &str,
        input: Value,
    ) -> Result<Value, FabricError> {
        self.calls.lock().push((name.to_string(), input));
        Ok(self.response.clone())
    }
}

#[derive(Default)]
struct RecordingEvents {
    log: Mutex<Vec<String>>,
}

#[async_trait]
impl crate::events::AgentEvents for RecordingEvents {
    async fn assistant_message(&self, _tab_id: TabId, message: &Message) {
        self.log.lock().push(format!("assistant:{}", message.text()));
    }
    async fn tool_call(&self, _tab_id: TabId, _id: &str, name: &str, _input: &Value) {
        self.log.lock().push(format!("tool_call:{name}"));
    }
    async fn tool_result(&self, _tab_id: TabId, _id: &str, _content: &str, is_error: bool) {
        self.log.lock().push(format!("tool_result:{is_error}"));
    }
    async fn todos_updated(&self, _tab_id: TabId, todos: &[Todo]) {
        self.log.lock().push(format!("todos:{}", todos.len()));
    }
    async fn done(&self, _tab_id: TabId) {
        self.log.lock().push("done".to_string());
    }
    async fn error(&self, _tab_id: TabId, message: &str) {
        self.log.lock().push(format!("error:{message}"));
    }
}

fn agent_loop(
    provider: Arc<MockProvider>,
    bridge: Arc<RecordingBridge>,
    events: Arc<dyn AgentEvents>,
) -> AgentLoop {
    AgentLoop::new(provider, bridge, events, AgentConfig::default())
}

fn ctx(mode: AgentMode) -> TurnContext {
    TurnContext {
        tab_id: 7,
        mode,
        cancel: CancellationToken::new(),
    }
}

#[tokio::test]
async fn text_only_response_ends_the_run() {
    let provider = Arc::new(MockProvider::new());
    provider.push_text("Nothing to do.");
    let bridge = Arc::new(RecordingBridge::new());
    let events = Arc::new(RecordingEvents::default());
    let agent = agent_loop(provider.clone(), bridge.clone(), events.clone());

    let mut history = Vec::new();
    let mut todos = Vec::new();
    agent
        .run_turn(&ctx(AgentMode::Execute), "hello".to_string(), &mut history, &mut todos)
        .await
        .unwrap();

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].role, Role::Assistant);
    assert!(bridge.calls.lock().is_empty());
    assert_eq!(
        events.log.lock().as_slice(),
        ["assistant:Nothing to do.", "done"]
    );
}

#[tokio::test]
async fn tool_results_append_as_single_user_message() {
    let provider = Arc::new(MockProvider::new());
    provider.push_blocks(
        vec![
            ContentBlock::text("Reading twice."),
            ContentBlock::ToolUse {
                id: "tu_1".to_string(),
                name: "Read".to_string(),
                input: json!({"path": "./page.html"}),
            },
            ContentBlock::ToolUse {
                id: "tu_2".to_string(),
                name: "Ls".to_string(),
                input: json!({}),
            },
        ],
        StopReason::ToolUse,
    );
    provider.push_text("Done looking.");

    let bridge = Arc::new(RecordingBridge::new());
    let agent = agent_loop(provider.clone(), bridge.clone(), Arc::new(NullEvents));

    let mut history = Vec::new();
    let mut todos = Vec::new();
    agent
        .run_turn(&ctx(AgentMode::Execute), "look".to_string(), &mut history, &mut todos)
        .await
        .unwrap();

    // user, assistant(tool_use x2), user(tool_result x2), assistant.
    assert_eq!(history.len(), 4);
    match &history[2].content {
        MessageContent::Blocks(blocks) => {
            assert_eq!(blocks.len(), 2);
            for (block, expected) in blocks.iter().zip(["tu_1", "tu_2"]) {
                match block {
                    ContentBlock::ToolResult { tool_use_id, .. } => {
                        assert_eq!(tool_use_id, expected)
                    }
                    other => panic!("expected tool_result, got {other:?}"),
                }
            }
        }
        other => panic!("expected blocks, got {other:?}"),
    }

    // Tools dispatched strictly in order.
    let calls = bridge.calls.lock();
    assert_eq!(calls[0].0, "Read");
    assert_eq!(calls[1].0, "Ls");
}

#[tokio::test]
async fn history_replays_blocks_verbatim() {
    let provider = Arc::new(MockProvider::new());
    provider.push_tool_use("Looking.", "tu_1", "Read", json!({"path": "./page.html"}));
    provider.push_text("Finished.");

    let bridge = Arc::new(RecordingBridge::new());
    let agent = agent_loop(provider.clone(), bridge, Arc::new(NullEvents));

    let mut history = Vec::new();
    let mut todos = Vec::new();
    agent
        .run_turn(&ctx(AgentMode::Execute), "go".to_string(), &mut history, &mut todos)
        .await
        .unwrap();

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    // The second request replays the assistant's tool_use blocks verbatim.
    let replayed = &requests[1].messages[1];
    assert_eq!(replayed.role, Role::Assistant);
    match &replayed.content {
        MessageContent::Blocks(blocks) => {
            assert!(blocks.iter().any(|b| matches!(
                b,
                ContentBlock::ToolUse { id, name, .. } if id == "tu_1" && name == "Read"
            )));
        }
        other => panic!("expected blocks, got {other:?}"),
    }
}

#[tokio::test]
async fn mode_selects_tools_and_prompt() {
    let provider = Arc::new(MockProvider::new());
    provider.push_text("plan made");
    let bridge = Arc::new(RecordingBridge::new());
    let agent = agent_loop(provider.clone(), bridge, Arc::new(NullEvents));

    let mut history = Vec::new();
    let mut todos = Vec::new();
    agent
        .run_turn(&ctx(AgentMode::Plan), "plan it".to_string(), &mut history, &mut todos)
        .await
        .unwrap();

    let request = &provider.requests()[0];
    assert!(request.system.as_deref().unwrap().contains("plan mode"));
    assert!(!request.tools.iter().any(|t| t.name == "Edit"));
}

#[tokio::test]
async fn cancellation_before_turn_stops() {
    let provider = Arc::new(MockProvider::new());
    provider.push_text("never seen");
    let bridge = Arc::new(RecordingBridge::new());
    let events = Arc::new(RecordingEvents::default());
    let agent = agent_loop(provider.clone(), bridge, events.clone());

    let ctx = ctx(AgentMode::Execute);
    ctx.cancel.cancel();

    let mut history = Vec::new();
    let mut todos = Vec::new();
    let err = agent
        .run_turn(&ctx, "go".to_string(), &mut history, &mut todos)
        .await
        .unwrap_err();
    assert_eq!(err, AgentError::Stopped);
    assert!(provider.requests().is_empty());
    assert_eq!(events.log.lock().as_slice(), ["error:Stopped by user"]);
}

#[tokio::test]
async fn cancellation_mid_batch_short_circuits_remaining_tools() {
    let provider = Arc::new(MockProvider::new());
    provider.push_blocks(
        vec![
            ContentBlock::ToolUse {
                id: "tu_1".to_string(),
                name: "TodoRead".to_string(),
                input: json!({}),
            },
            ContentBlock::ToolUse {
                id: "tu_2".to_string(),
                name: "Read".to_string(),
                input: json!({"path": "./page.html"}),
            },
        ],
        StopReason::ToolUse,
    );

    struct CancellingEvents {
        cancel: CancellationToken,
    }
    #[async_trait]
    impl AgentEvents for CancellingEvents {
        async fn assistant_message(&self, _t: TabId, _m: &Message) {}
        async fn tool_call(&self, _t: TabId, _i: &str, _n: &str, _in: &Value) {}
        async fn tool_result(&self, _t: TabId, _i: &str, _c: &str, _e: bool) {
            // The user hits stop while the first tool is finishing.
            self.cancel.cancel();
        }
        async fn todos_updated(&self, _t: TabId, _todos: &[Todo]) {}
        async fn done(&self, _t: TabId) {}
        async fn error(&self, _t: TabId, _m: &str) {}
    }

    let ctx = ctx(AgentMode::Execute);
    let bridge = Arc::new(RecordingBridge::new());
    let agent = AgentLoop::new(
        provider.clone(),
        bridge.clone(),
        Arc::new(CancellingEvents {
            cancel: ctx.cancel.clone(),
        }),
        AgentConfig::default(),
    );

    let mut history = Vec::new();
    let mut todos = Vec::new();
    let err = agent
        .run_turn(&ctx, "go".to_string(), &mut history, &mut todos)
        .await
        .unwrap_err();
    assert_eq!(err, AgentError::Stopped);
    // The second (page-bound) tool never ran.
    assert!(bridge.calls.lock().is_empty());
}

#[tokio::test]
async fn api_error_terminates_the_run() {
    let provider = Arc::new(MockProvider::new());
    provider.push_error(ProviderError::Api {
        status: 529,
        message: "overloaded".to_string(),
    });
    let events = Arc::new(RecordingEvents::default());
    let agent = agent_loop(provider, Arc::new(RecordingBridge::new()), events.clone());

    let mut history = Vec::new();
    let mut todos = Vec::new();
    let err = agent
        .run_turn(&ctx(AgentMode::Execute), "go".to_string(), &mut history, &mut todos)
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::Api(_)));
    let log = events.log.lock();
    assert!(log.iter().any(|l| l.starts_with("error:") && l.contains("overloaded")));
}

#[tokio::test]
async fn turn_limit_is_enforced() {
    let provider = Arc::new(MockProvider::new());
    for i in 0..3 {
        provider.push_tool_use("again", &format!("tu_{i}"), "TodoRead", json!({}));
    }
    let agent = AgentLoop::new(
        provider,
        Arc::new(RecordingBridge::new()),
        Arc::new(NullEvents),
        AgentConfig {
            max_turns: 2,
            ..AgentConfig::default()
        },
    );

    let mut history = Vec::new();
    let mut todos = Vec::new();
    let err = agent
        .run_turn(&ctx(AgentMode::Execute), "loop".to_string(), &mut history, &mut todos)
        .await
        .unwrap_err();
    assert_eq!(err, AgentError::MaxTurns(2));
}

#[tokio::test]
async fn todo_updates_emit_events_and_persist() {
    let provider = Arc::new(MockProvider::new());
    provider.push_tool_use(
        "Tracking.",
        "tu_1",
        "TodoWrite",
        json!({"todos": [{"id": "1", "content": "step", "status": "pending"}]}),
    );
    provider.push_text("Tracked.");

    let events = Arc::new(RecordingEvents::default());
    let agent = agent_loop(provider, Arc::new(RecordingBridge::new()), events.clone());

    let mut history = Vec::new();
    let mut todos = Vec::new();
    agent
        .run_turn(&ctx(AgentMode::Plan), "track".to_string(), &mut history, &mut todos)
        .await
        .unwrap();

    assert_eq!(todos.len(), 1);
    assert!(events.log.lock().iter().any(|l| l == "todos:1"));
}

#[tokio::test]
async fn tool_failure_does_not_terminate_run() {
    let provider = Arc::new(MockProvider::new());
    // Invalid input: Read without a path.
    provider.push_tool_use("Bad call.", "tu_1", "Read", json!({}));
    provider.push_text("Recovered.");

    let events = Arc::new(RecordingEvents::default());
    let agent = agent_loop(provider, Arc::new(RecordingBridge::new()), events.clone());

    let mut history = Vec::new();
    let mut todos = Vec::new();
    agent
        .run_turn(&ctx(AgentMode::Execute), "go".to_string(), &mut history, &mut todos)
        .await
        .unwrap();

    let log = events.log.lock();
    assert!(log.contains(&"tool_result:true".to_string()));
    assert!(log.contains(&"done".to_string()));
}
