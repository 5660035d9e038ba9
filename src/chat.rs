//! Interactive chat against a local page.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use pagehands_agent::provider::AnthropicProvider;
use pagehands_agent::AgentConfig;
use pagehands_fabric::{
    Background, BackgroundConfig, FixedCapture, InProcessPageTransport, RecordingExecutor,
};
use pagehands_lifecycle::MemoryUserScriptHost;
use pagehands_protocols::fabric::{Request, Response, StreamEvent};
use pagehands_protocols::types::TabId;
use pagehands_vfs::{DomainStore, FileKvStore, KeyValueStore, MemoryKvStore, SessionArtifacts};

use crate::CliError;

const TAB: TabId = 1;

pub(crate) async fn run(
    page: PathBuf,
    url: String,
    data_dir: Option<PathBuf>,
    model: String,
) -> Result<(), CliError> {
    let api_key = std::env::var("ANTHROPIC_API_KEY")
        .map_err(|_| CliError::Config("ANTHROPIC_API_KEY is not set".to_string()))?;
    let html = tokio::fs::read_to_string(&page).await?;

    let kv: Arc<dyn KeyValueStore> = match &data_dir {
        Some(dir) => Arc::new(FileKvStore::open(dir)?),
        None => Arc::new(MemoryKvStore::new()),
    };
    let store = DomainStore::new(kv);
    let executor = Arc::new(RecordingExecutor::new());
    let capture = Arc::new(FixedCapture::new());
    let transport = Arc::new(InProcessPageTransport::new(
        store.clone(),
        Arc::new(SessionArtifacts::new()),
        executor.clone(),
        capture.clone(),
        true,
    ));
    transport.attach_tab(TAB, &html, &url).await?;

    let background = Background::new(
        store,
        transport,
        Arc::new(AnthropicProvider::new(api_key)),
        executor,
        capture,
        Arc::new(MemoryUserScriptHost::new()),
        BackgroundConfig {
            agent: AgentConfig {
                model,
                ..AgentConfig::default()
            },
            ..BackgroundConfig::default()
        },
    );
    let services = background.spawn_services();

    let mut events = background.ports().connect(TAB);
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    info!(page = %page.display(), %url, "chat session started");
    println!("Commands: /plan /execute /approve /reject [feedback] /stop /clear /files /quit");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    print!("> ");
    use std::io::Write as _;
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if !line.is_empty() {
            if line == "/quit" {
                break;
            }
            match to_request(line) {
                Some(request) => match background.handle(request).await {
                    Ok(response) => print_response(&response),
                    Err(err) => println!("error: {err}"),
                },
                None => println!("unknown command: {line}"),
            }
        }
        print!("> ");
        std::io::stdout().flush()?;
    }

    services.cancel();
    Ok(())
}

fn to_request(line: &str) -> Option<Request> {
    if let Some(rest) = line.strip_prefix('/') {
        let (command, arg) = rest.split_once(' ').unwrap_or((rest, ""));
        let arg = arg.trim();
        return match command {
            "plan" => Some(Request::SetMode {
                tab_id: TAB,
                mode: pagehands_protocols::types::AgentMode::Plan,
            }),
            "execute" => Some(Request::SetMode {
                tab_id: TAB,
                mode: pagehands_protocols::types::AgentMode::Execute,
            }),
            "approve" => Some(Request::ApprovePlan { tab_id: TAB }),
            "reject" => Some(Request::RejectPlan {
                tab_id: TAB,
                feedback: (!arg.is_empty()).then(|| arg.to_string()),
            }),
            "stop" => Some(Request::StopAgent { tab_id: TAB }),
            "clear" => Some(Request::ClearHistory { tab_id: TAB }),
            "files" => Some(Request::GetVfsFiles { tab_id: TAB }),
            _ => None,
        };
    }
    Some(Request::ChatMessage {
        tab_id: TAB,
        content: line.to_string(),
    })
}

fn print_response(response: &Response) {
    match response {
        Response::Ack => {}
        Response::VfsFiles { files, error } => {
            if let Some(error) = error {
                println!("files unavailable: {error}");
            }
            for file in files {
                println!(
                    "  {}{}/{}/{}  v{}  {}",
                    file.domain,
                    if file.url_path == "/" { "" } else { &file.url_path },
                    file.kind.dir_name(),
                    file.name,
                    file.version,
                    if file.enabled { "enabled" } else { "disabled" },
                );
            }
        }
        other => println!("{other:?}"),
    }
}

fn print_event(event: &StreamEvent) {
    match event {
        StreamEvent::AgentResponse { message, .. } => {
            let text = message.text();
            if !text.is_empty() {
                println!("\nagent: {text}");
            }
        }
        StreamEvent::ToolCall { name, input, .. } => {
            println!("  [tool] {name} {input}");
        }
        StreamEvent::ToolResult { is_error, .. } => {
            if *is_error {
                println!("  [tool] failed");
            }
        }
        StreamEvent::TodosUpdated { todos, .. } => {
            println!("  [todos] {} items", todos.len());
        }
        StreamEvent::ModeChanged {
            mode,
            awaiting_approval,
            ..
        } => {
            if *awaiting_approval {
                println!("  [mode] {mode}; plan awaiting approval (/approve or /reject)");
            } else {
                println!("  [mode] {mode}");
            }
        }
        StreamEvent::AgentDone { .. } => println!("  [done]"),
        StreamEvent::AgentError { message, .. } => println!("  [error] {message}"),
        StreamEvent::VfsStorageChanged { key } => {
            println!("  [storage] {key} changed");
        }
    }
}
