use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::{
    config::{clamp_prefix, parse_prefix, DEFAULT_PREFIX},
    scanner::{ScanCoordinator, StartOutcome},
    types::{Endpoint, ProgressSnapshot, ScanState, Severity},
    updates::{ScanListener, UpdateReceiver},
};

/// What a client would render: the latest applied events.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ViewState {
    pub progress: ProgressSnapshot,
    pub results: Vec<Endpoint>,
    pub message: Option<String>,
    pub severity: Option<Severity>,
    pub last_found: Option<usize>,
}

pub type SharedView = Arc<RwLock<ViewState>>;

/// Listener that folds events into a [`SharedView`].
#[derive(Debug, Clone, Default)]
pub struct ViewListener {
    view: SharedView,
}

impl ViewListener {
    pub fn new(view: SharedView) -> Self {
        Self { view }
    }
}

impl ScanListener for ViewListener {
    fn on_progress(&mut self, progress: ProgressSnapshot) {
        let mut v = self.view.write();
        v.progress = progress;
        v.message = Some(progress.status_line());
        v.severity = Some(Severity::Info);
    }

    fn on_results_changed(&mut self, results: &[Endpoint]) {
        self.view.write().results = results.to_vec();
    }

    fn on_status(&mut self, message: &str, severity: Severity) {
        let mut v = self.view.write();
        v.message = Some(message.to_string());
        v.severity = Some(severity);
    }

    fn on_complete(&mut self, found: usize) {
        self.view.write().last_found = Some(found);
    }
}

#[derive(Clone)]
pub struct AppState {
    coordinator: Arc<ScanCoordinator>,
    view: SharedView,
}

#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub state: ScanState,
    pub processed: u64,
    pub total: u64,
    pub percent: f64,
    pub found: usize,
    pub message: Option<String>,
    pub severity: Option<Severity>,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub address: String,
    #[serde(default)]
    pub prefix: Option<PrefixInput>,
}

/// Prefix as sent by a client: a JSON number or free text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PrefixInput {
    Number(i64),
    Text(String),
}

impl PrefixInput {
    /// Numbers are clamped; text goes through the input-field rule.
    pub fn resolve(&self) -> u8 {
        match self {
            PrefixInput::Number(n) => clamp_prefix(*n),
            PrefixInput::Text(t) => parse_prefix(t),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Build the `/api` router around a coordinator and the view its consumer
/// keeps up to date.
pub fn router(coordinator: Arc<ScanCoordinator>, view: SharedView) -> Router {
    let state = AppState { coordinator, view };
    let api = Router::new()
        .route("/status", get(get_status))
        .route("/scan", post(post_scan))
        .route("/stop", post(post_stop))
        .route("/results", get(get_results).delete(delete_result))
        .with_state(state);

    Router::new().nest("/api", api).layer(TraceLayer::new_for_http())
}

/// Serve the control API on `bind` until `shutdown` fires. Events are applied
/// by a background consumer task.
pub async fn spawn_server(
    bind: &str,
    coordinator: Arc<ScanCoordinator>,
    updates: UpdateReceiver,
    shutdown: CancellationToken,
) -> Result<()> {
    let view = SharedView::default();
    let period = coordinator.config().drain_period;
    let consumer = tokio::spawn(updates.run(period, ViewListener::new(view.clone()), shutdown.clone()));

    let app = router(coordinator, view);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("serving scan API on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await?;

    shutdown.cancel();
    let _ = consumer.await;
    Ok(())
}

async fn get_status(State(app): State<AppState>) -> impl IntoResponse {
    let v = app.view.read();
    let out = Status {
        state: app.coordinator.state(),
        processed: v.progress.processed,
        total: v.progress.total,
        percent: v.progress.percent(),
        found: v.results.len(),
        message: v.message.clone(),
        severity: v.severity,
    };
    (StatusCode::OK, Json(out))
}

async fn get_results(State(app): State<AppState>) -> impl IntoResponse {
    let results = app.view.read().results.clone();
    (StatusCode::OK, Json(results))
}

async fn post_scan(State(app): State<AppState>, Json(req): Json<ScanRequest>) -> impl IntoResponse {
    let prefix = req.prefix.as_ref().map_or(DEFAULT_PREFIX, PrefixInput::resolve);
    match app.coordinator.start(&req.address, i64::from(prefix)) {
        Ok(StartOutcome::Started { scan, total }) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "scan": scan, "total": total, "state": ScanState::Running })),
        )
            .into_response(),
        Ok(StartOutcome::Stopped) => (
            StatusCode::OK,
            Json(serde_json::json!({ "state": ScanState::Idle })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn post_stop(State(app): State<AppState>) -> impl IntoResponse {
    let stopped = app.coordinator.stop();
    (StatusCode::OK, Json(serde_json::json!({ "stopped": stopped })))
}

async fn delete_result(
    State(app): State<AppState>,
    Json(endpoint): Json<Endpoint>,
) -> impl IntoResponse {
    if app.coordinator.consume_result(&endpoint) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
