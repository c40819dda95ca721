//! End-to-end tests: relay over TCP in front of a mock execution provider.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use runpad_relay::{
    HttpExecutionProvider, ProviderConfig, ProviderCredentials, RelayConfig, RelayServer,
    GENERIC_FAILURE_MESSAGE,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const CLIENT_ID: &str = "test-client-id";
const CLIENT_SECRET: &str = "test-client-secret";

#[derive(Clone)]
struct MockProviderState {
    status: StatusCode,
    body: Value,
    requests: Arc<Mutex<Vec<Value>>>,
}

async fn execute_handler(
    State(state): State<MockProviderState>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.requests.lock().unwrap().push(payload);
    (state.status, Json(state.body.clone()))
}

struct MockProvider {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Value>>>,
    _shutdown_tx: oneshot::Sender<()>,
}

impl MockProvider {
    async fn start(status: StatusCode, body: Value) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockProviderState {
            status,
            body,
            requests: requests.clone(),
        };
        let app = Router::new()
            .route("/v1/execute", post(execute_handler))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            requests,
            _shutdown_tx: shutdown_tx,
        }
    }

    fn url(&self) -> String {
        format!("http://{}/v1/execute", self.addr)
    }

    fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

struct RunningRelay {
    addr: SocketAddr,
    _shutdown_tx: oneshot::Sender<()>,
}

async fn start_relay(provider_url: String) -> RunningRelay {
    let credentials = ProviderCredentials::new(CLIENT_ID, CLIENT_SECRET).unwrap();
    let provider = HttpExecutionProvider::new(
        ProviderConfig::new(credentials)
            .with_url(provider_url)
            .with_version_index("4")
            .with_timeout(Duration::from_secs(5)),
    );
    let server = RelayServer::with_config(provider, RelayConfig::new().with_logging(false));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        server
            .serve_listener(listener, async {
                shutdown_rx.await.ok();
            })
            .await
            .unwrap();
    });

    RunningRelay {
        addr,
        _shutdown_tx: shutdown_tx,
    }
}

async fn execute(relay: &RunningRelay, body: Value) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(format!("http://{}/api/execute", relay.addr))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    let body = response.json::<Value>().await.unwrap();
    (status, body)
}

#[tokio::test]
async fn test_success_passes_provider_body_through() {
    let provider = MockProvider::start(
        StatusCode::OK,
        json!({"output": "42\n", "statusCode": 200, "memory": "7340", "cpuTime": "0.02"}),
    )
    .await;
    let relay = start_relay(provider.url()).await;

    let (status, body) = execute(&relay, json!({"script": "print(42)", "language": "python3"})).await;

    assert_eq!(status, 200);
    assert_eq!(
        body,
        json!({"output": "42\n", "statusCode": 200, "memory": "7340", "cpuTime": "0.02"})
    );
}

#[tokio::test]
async fn test_credentials_and_version_index_are_attached_server_side() {
    let provider = MockProvider::start(StatusCode::OK, json!({"output": "ok"})).await;
    let relay = start_relay(provider.url()).await;

    let (status, body) = execute(
        &relay,
        json!({
            "script": "print('ok')",
            "language": "python3",
            "clientId": "attacker",
            "clientSecret": "attacker"
        }),
    )
    .await;
    assert_eq!(status, 200);
    assert!(!body.to_string().contains(CLIENT_SECRET));

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0],
        json!({
            "clientId": CLIENT_ID,
            "clientSecret": CLIENT_SECRET,
            "script": "print('ok')",
            "language": "python3",
            "versionIndex": "4"
        })
    );
}

#[tokio::test]
async fn test_provider_error_becomes_bad_gateway() {
    let provider = MockProvider::start(
        StatusCode::TOO_MANY_REQUESTS,
        json!({"error": "Daily limit reached", "statusCode": 429}),
    )
    .await;
    let relay = start_relay(provider.url()).await;

    let (status, body) = execute(&relay, json!({"script": "print(1)", "language": "python3"})).await;

    assert_eq!(status, 502);
    assert_eq!(body["upstreamStatus"], "429");
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("Daily limit reached"));
    assert!(!body.to_string().contains(CLIENT_SECRET));
}

#[tokio::test]
async fn test_validation_failure_never_reaches_provider() {
    let provider = MockProvider::start(StatusCode::OK, json!({"output": "unused"})).await;
    let relay = start_relay(provider.url()).await;

    let (status, body) = execute(&relay, json!({"script": "", "language": "python3"})).await;

    assert_eq!(status, 400);
    assert!(body["error"].is_string());
    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn test_unreachable_provider_is_generic_internal_error() {
    // Bind and immediately drop a listener to get a port nobody answers on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = listener.local_addr().unwrap();
    drop(listener);

    let relay = start_relay(format!("http://{}/v1/execute", dead_addr)).await;

    let (status, body) = execute(&relay, json!({"script": "print(1)", "language": "python3"})).await;

    assert_eq!(status, 500);
    assert_eq!(body, json!({"error": GENERIC_FAILURE_MESSAGE}));
}
