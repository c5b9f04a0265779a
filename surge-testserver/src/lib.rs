use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_HEALTH: &str = "/health";
pub const PATH_VALIDATE: &str = "/validate";
pub const PATH_FLAKY: &str = "/flaky";
pub const PATH_SLOW: &str = "/slow";
pub const PATH_STATUS: &str = "/status/{code}";

/// Every `FLAKY_PERIOD`-th request to [`PATH_FLAKY`] answers 503 (80% success).
pub const FLAKY_PERIOD: u64 = 5;

/// Latency injected by [`PATH_SLOW`].
pub const SLOW_DELAY: Duration = Duration::from_millis(150);

/// Tool names the stub validator treats as dangerous.
const BLOCKED_TOOLS: &[&str] = &["exec", "shell", "eval", "run_command"];

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    validate_total: Arc<AtomicU64>,
    validate_blocked: Arc<AtomicU64>,
    flaky_total: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc_requests_total(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_validate_total(&self) {
        self.validate_total.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_validate_blocked(&self) {
        self.validate_blocked.fetch_add(1, Ordering::Relaxed);
    }

    fn next_flaky(&self) -> u64 {
        self.flaky_total.fetch_add(1, Ordering::Relaxed)
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn validate_total(&self) -> u64 {
        self.validate_total.load(Ordering::Relaxed)
    }

    pub fn validate_blocked(&self) -> u64 {
        self.validate_blocked.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Deserialize)]
struct ToolCallRequest {
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Option<ToolCallParams>,
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ValidationResponse {
    allowed: bool,
    method: String,
    tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

async fn handle_health(State(stats): State<TestServerStats>) -> Json<serde_json::Value> {
    stats.inc_requests_total();
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn handle_validate(
    State(stats): State<TestServerStats>,
    body: Bytes,
) -> (StatusCode, Json<serde_json::Value>) {
    stats.inc_requests_total();
    stats.inc_validate_total();

    let req: ToolCallRequest = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": format!("bad json-rpc body: {err}") })),
            );
        }
    };
    if req.jsonrpc != "2.0" {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "unsupported jsonrpc version" })),
        );
    }

    let tool = req.params.as_ref().map(|p| p.name.clone());
    let blocked = req
        .params
        .as_ref()
        .is_some_and(|p| BLOCKED_TOOLS.contains(&p.name.as_str()) || !p.arguments.is_object());
    if blocked {
        stats.inc_validate_blocked();
    }

    // The decision travels in the body; the harness only looks at availability.
    let res = ValidationResponse {
        allowed: !blocked,
        method: req.method,
        reason: blocked.then(|| "tool call rejected by policy".to_string()),
        tool,
    };
    match serde_json::to_value(&res) {
        Ok(v) => (StatusCode::OK, Json(v)),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "encode error" })),
        ),
    }
}

async fn handle_flaky(State(stats): State<TestServerStats>) -> StatusCode {
    stats.inc_requests_total();
    let n = stats.next_flaky();
    if n % FLAKY_PERIOD == FLAKY_PERIOD - 1 {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

async fn handle_slow(State(stats): State<TestServerStats>) -> &'static str {
    stats.inc_requests_total();
    sleep(SLOW_DELAY).await;
    "slow"
}

async fn handle_status(State(stats): State<TestServerStats>, Path(code): Path<u16>) -> StatusCode {
    stats.inc_requests_total();
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

pub fn router(stats: TestServerStats) -> Router {
    Router::new()
        .route(PATH_HEALTH, get(handle_health))
        .route(PATH_VALIDATE, post(handle_validate))
        .route(PATH_FLAKY, get(handle_flaky))
        .route(PATH_SLOW, get(handle_slow))
        .route(PATH_STATUS, get(handle_status))
        .with_state(stats)
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
