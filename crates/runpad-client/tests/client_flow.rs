//! Full client flow: headless widgets, orchestrator, relay and a mock provider.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use runpad_client::headless::{MemoryEditorFactory, MemoryTerminalFactory, ResizeListeners};
use runpad_client::{
    ClientConfig, ExecutionBackend, Language, LoadSignal, MountPoint, Orchestrator,
    OrchestratorProps, RelayBackend, StatusKind,
};
use runpad_relay::{HttpExecutionProvider, ProviderConfig, ProviderCredentials, RelayConfig, RelayServer};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Clone)]
struct Provider {
    status: StatusCode,
    scripts: Arc<Mutex<Vec<String>>>,
}

async fn provider_execute(
    State(provider): State<Provider>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let script = payload["script"].as_str().unwrap_or_default().to_string();
    provider.scripts.lock().unwrap().push(script.clone());

    if provider.status.is_success() {
        (provider.status, Json(json!({"output": format!("executed: {}\n", script)})))
    } else {
        (provider.status, Json(json!({"error": "Invalid clientId"})))
    }
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Starts a provider and a relay in front of it. Returns the relay URL.
async fn start_stack(status: StatusCode) -> (String, Arc<Mutex<Vec<String>>>) {
    let scripts = Arc::new(Mutex::new(Vec::new()));
    let provider_addr = spawn(
        Router::new()
            .route("/v1/execute", post(provider_execute))
            .with_state(Provider {
                status,
                scripts: scripts.clone(),
            }),
    )
    .await;

    let provider = HttpExecutionProvider::new(
        ProviderConfig::new(ProviderCredentials::new("id", "secret").unwrap())
            .with_url(format!("http://{}/v1/execute", provider_addr)),
    );
    let relay = RelayServer::with_config(provider, RelayConfig::new().with_logging(false));
    let relay_addr = spawn(relay.build_router()).await;

    (format!("http://{}", relay_addr), scripts)
}

fn orchestrator(
    backend: Arc<dyn ExecutionBackend>,
    editor: &MemoryEditorFactory,
    terminal: &MemoryTerminalFactory,
) -> (Orchestrator, LoadSignal) {
    let signal = LoadSignal::new();
    let orchestrator = Orchestrator::new(OrchestratorProps {
        config: ClientConfig::default().with_settle_delay(Duration::from_millis(10)),
        registry: Arc::new(signal.clone()),
        load_signal: Some(signal.clone()),
        editor_factory: Arc::new(editor.clone()),
        terminal_factory: Arc::new(terminal.clone()),
        window: Arc::new(ResizeListeners::new()),
        backend,
        initial_code: String::new(),
        language: Language::Python,
    });
    (orchestrator, signal)
}

#[tokio::test]
async fn test_edit_run_render_through_relay() {
    let (relay_url, scripts) = start_stack(StatusCode::OK).await;
    let backend = Arc::new(RelayBackend::new(relay_url));
    backend.health_check().await.unwrap();

    let editor = MemoryEditorFactory::new();
    let terminal = MemoryTerminalFactory::new();
    let (mut orchestrator, signal) = orchestrator(backend, &editor, &terminal);

    orchestrator.start();
    orchestrator.mount_editor(MountPoint::new("editor"));
    orchestrator.mount_terminal(MountPoint::new("terminal"));
    signal.mark_editor_loaded();
    signal.mark_terminal_loaded();
    orchestrator.wait_until_interactive().await.unwrap();

    editor.type_text("print(6 * 7)");
    let result = orchestrator.run_to_completion().await.unwrap();

    assert_eq!(result.status_kind, StatusKind::Success);
    assert_eq!(result.output, "executed: print(6 * 7)\n");
    assert!(!result.simulated);
    assert_eq!(scripts.lock().unwrap().as_slice(), ["print(6 * 7)"]);
    assert!(terminal.output().ends_with("executed: print(6 * 7)\r\n"));
}

#[tokio::test]
async fn test_provider_rejection_is_rendered_as_upstream_error() {
    let (relay_url, _scripts) = start_stack(StatusCode::UNAUTHORIZED).await;
    let editor = MemoryEditorFactory::new();
    let terminal = MemoryTerminalFactory::new();
    let (mut orchestrator, signal) =
        orchestrator(Arc::new(RelayBackend::new(relay_url)), &editor, &terminal);

    orchestrator.mount_editor(MountPoint::new("editor"));
    orchestrator.mount_terminal(MountPoint::new("terminal"));
    signal.mark_editor_loaded();
    signal.mark_terminal_loaded();
    orchestrator.wait_until_interactive().await.unwrap();

    editor.type_text("print(1)");
    let result = orchestrator.run_to_completion().await.unwrap();

    assert_eq!(result.status_kind, StatusKind::UpstreamError);
    assert!(result.detail.unwrap().contains("401"));
    assert!(terminal
        .output()
        .contains("Error: Execution provider returned an error"));
}

#[tokio::test]
async fn test_blank_buffer_is_rejected_by_relay() {
    let (relay_url, scripts) = start_stack(StatusCode::OK).await;
    let editor = MemoryEditorFactory::new();
    let terminal = MemoryTerminalFactory::new();
    let (mut orchestrator, signal) =
        orchestrator(Arc::new(RelayBackend::new(relay_url)), &editor, &terminal);

    orchestrator.mount_editor(MountPoint::new("editor"));
    signal.mark_editor_loaded();
    signal.mark_terminal_loaded();
    orchestrator.wait_until_interactive().await.unwrap();

    editor.type_text("   ");
    let result = orchestrator.run_to_completion().await.unwrap();

    assert_eq!(result.status_kind, StatusKind::ValidationError);
    assert!(scripts.lock().unwrap().is_empty());
}
