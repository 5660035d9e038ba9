use super::*;
use crate::hosts::{FixedCapture, RecordingExecutor};
use pagehands_protocols::fabric::ArtifactKind;
use pagehands_protocols::host::MainWorldOutcome;
use pagehands_vfs::MemoryKvStore;

struct Rig {
    transport: InProcessPageTransport,
    store: DomainStore,
    executor: Arc<RecordingExecutor>,
}

fn rig(persistent_registration: bool) -> Rig {
    let store = DomainStore::new(Arc::new(MemoryKvStore::new()));
    let executor = Arc::new(RecordingExecutor::new());
    let transport = InProcessPageTransport::new(
        store.clone(),
        Arc::new(SessionArtifacts::new()),
        executor.clone(),
        Arc::new(FixedCapture::new()),
        persistent_registration,
    );
    Rig {
        transport,
        store,
        executor,
    }
}

fn tool(name: &str, input: Value) -> PageRequest {
    PageRequest::Tool {
        name: name.to_string(),
        input,
    }
}

fn tool_result(response: PageResponse) -> Value {
    match response {
        PageResponse::Tool { result } => result,
        other => panic!("expected tool response, got {other:?}"),
    }
}

#[tokio::test]
async fn attach_injects_styles_on_load() {
    let rig = rig(true);
    rig.store
        .write_file("x.test", "/", ArtifactKind::Style, "dark.css", "body{}".into(), 0)
        .await
        .unwrap();

    rig.transport
        .attach_tab(1, "<head></head><body></body>", "https://x.test/")
        .await
        .unwrap();
    let worker = rig.transport.worker(1).unwrap();
    let (content, _) = worker.vfs().page().read_formatted();
    assert!(content.contains("pagehands-style-dark-css"));
}

#[tokio::test]
async fn attach_without_facility_runs_fallback_injection() {
    let rig = rig(false);
    rig.store
        .write_file("x.test", "/", ArtifactKind::Script, "a.js", "// one-shot".into(), 0)
        .await
        .unwrap();

    rig.transport
        .attach_tab(1, "<body></body>", "https://x.test/")
        .await
        .unwrap();
    let executed = rig.executor.executed();
    assert_eq!(executed.len(), 1);
    assert!(executed[0].contains("// one-shot"));
}

#[tokio::test]
async fn attach_with_facility_skips_fallback() {
    let rig = rig(true);
    rig.store
        .write_file("x.test", "/", ArtifactKind::Script, "a.js", "// registered".into(), 0)
        .await
        .unwrap();

    rig.transport
        .attach_tab(1, "<body></body>", "https://x.test/")
        .await
        .unwrap();
    assert!(rig.executor.executed().is_empty());
}

#[tokio::test]
async fn tool_requests_round_trip() {
    let rig = rig(true);
    rig.transport
        .attach_tab(1, "<body><p>hello</p></body>", "https://x.test/")
        .await
        .unwrap();

    let result = tool_result(
        rig.transport
            .request(1, tool("Read", serde_json::json!({"path": "./page.html"})))
            .await
            .unwrap(),
    );
    assert_eq!(result["version"], 1);
    assert!(result["content"].as_str().unwrap().contains("hello"));
}

#[tokio::test]
async fn vfs_errors_become_payloads_not_transport_errors() {
    let rig = rig(true);
    rig.transport
        .attach_tab(1, "<body></body>", "https://x.test/")
        .await
        .unwrap();

    let result = tool_result(
        rig.transport
            .request(1, tool("Read", serde_json::json!({"path": "./scripts/no.js"})))
            .await
            .unwrap(),
    );
    assert_eq!(result["error"], "NOT_FOUND");
}

#[tokio::test]
async fn bash_inline_goes_to_main_world() {
    let rig = rig(true);
    rig.transport
        .attach_tab(1, "<body></body>", "https://x.test/")
        .await
        .unwrap();
    rig.executor.push_outcome(MainWorldOutcome::ok("3"));

    let result = tool_result(
        rig.transport
            .request(1, tool("Bash", serde_json::json!({"command": "1 + 2"})))
            .await
            .unwrap(),
    );
    assert_eq!(result["success"], true);
    assert_eq!(result["result"], "3");
    assert_eq!(rig.executor.executed(), vec!["1 + 2"]);
}

#[tokio::test]
async fn bash_exec_runs_stored_script() {
    let rig = rig(true);
    rig.store
        .write_file("x.test", "/", ArtifactKind::Script, "a.js", "saved()".into(), 0)
        .await
        .unwrap();
    rig.transport
        .attach_tab(1, "<body></body>", "https://x.test/")
        .await
        .unwrap();

    let result = tool_result(
        rig.transport
            .request(
                1,
                tool("Bash", serde_json::json!({"command": "exec ./scripts/a.js"})),
            )
            .await
            .unwrap(),
    );
    assert_eq!(result["success"], true);
    assert_eq!(rig.executor.executed(), vec!["saved()"]);
}

#[tokio::test]
async fn screenshot_tool_stores_capture() {
    let rig = rig(true);
    rig.transport
        .attach_tab(1, "<body></body>", "https://x.test/")
        .await
        .unwrap();

    let result = tool_result(
        rig.transport
            .request(1, tool("Screenshot", serde_json::json!({})))
            .await
            .unwrap(),
    );
    assert_eq!(result["path"], "/x.test/screenshot.png");
    assert_eq!(result["version"], 1);

    let read = tool_result(
        rig.transport
            .request(1, tool("Read", serde_json::json!({"path": "./screenshot.png"})))
            .await
            .unwrap(),
    );
    assert!(read["content"].as_str().unwrap().starts_with("data:image/png"));
}

#[tokio::test]
async fn unknown_tool_is_an_error_payload() {
    let rig = rig(true);
    rig.transport
        .attach_tab(1, "<body></body>", "https://x.test/")
        .await
        .unwrap();
    let result = tool_result(
        rig.transport
            .request(1, tool("Teleport", serde_json::json!({})))
            .await
            .unwrap(),
    );
    assert_eq!(result["error"], "INVALID_PATH");
}

#[tokio::test]
async fn uninjected_tab_is_no_receiver_until_injected() {
    let rig = rig(true);
    rig.transport.register_tab(1, "<body></body>", "https://x.test/");

    let err = rig.transport.request(1, PageRequest::ListFiles).await.unwrap_err();
    assert!(matches!(err, FabricError::NoReceiver(1)));

    // The standard recovery injects and retries once.
    let response = send_to_page(&rig.transport, 1, PageRequest::ListFiles)
        .await
        .unwrap();
    assert!(matches!(response, PageResponse::Files { .. }));
}

#[tokio::test]
async fn unscriptable_tab_is_privileged() {
    let rig = rig(true);
    let err = send_to_page(&rig.transport, 42, PageRequest::ListFiles)
        .await
        .unwrap_err();
    assert!(matches!(err, FabricError::PrivilegedPage(_)));
}

#[tokio::test]
async fn delete_and_toggle_round_trip() {
    let rig = rig(true);
    rig.store
        .write_file("x.test", "/", ArtifactKind::Script, "a.js", "1".into(), 0)
        .await
        .unwrap();
    rig.transport
        .attach_tab(1, "<body></body>", "https://x.test/")
        .await
        .unwrap();

    let response = rig
        .transport
        .request(
            1,
            PageRequest::ToggleFileEnabled {
                kind: ArtifactKind::Script,
                name: "a.js".to_string(),
            },
        )
        .await
        .unwrap();
    assert!(matches!(response, PageResponse::Toggled { enabled: false }));

    let response = rig
        .transport
        .request(
            1,
            PageRequest::DeleteFile {
                kind: ArtifactKind::Script,
                name: "a.js".to_string(),
            },
        )
        .await
        .unwrap();
    assert!(matches!(response, PageResponse::Deleted { removed: true }));
}
