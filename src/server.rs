//! HTTP API over the project log.
//!
//! Handlers are thin: they validate the request, call the store, reader,
//! aggregator or exporter, and wrap the result in JSON. Core calls are
//! synchronous filesystem operations and run on tokio's blocking pool.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/log_meeting` | Persist a meeting record |
//! | `POST` | `/log_requirement` | Persist a requirement change |
//! | `POST` | `/log_milestone` | Persist a milestone |
//! | `GET`  | `/project_summary?days=N` | Summary of the trailing window |
//! | `GET`  | `/export_project_report?days=N` | Summarize and write a report file |
//! | `GET`  | `/project_context?category=X` | Chat context text, or records matching a term |
//! | `GET`  | `/` | Chat page |
//! | `POST` | `/chat` | Relay a question to the completion provider |
//! | `POST` | `/reset` | Clear the chat history |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "window_days must be positive, got 0" } }
//! ```
//!
//! Error codes: `bad_request` (400), `chat_disabled` (400),
//! `storage_error` (500), `internal` (500), `upstream_error` (502).

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::chat::{create_provider, ChatError, ChatReply, ChatRelay, CompletionProvider};
use crate::config::Config;
use crate::error::{LogError, LogResult};
use crate::export::{export_window, report_path};
use crate::models::{record_from_json, LogRecord, MeetingRecord, MilestoneRecord, RequirementChangeRecord};
use crate::store::RecordStore;
use crate::summary::{filter_by_term, render_context, summarize, ProjectSummary, RecordCounts};

const CHAT_PAGE: &str = include_str!("../static/index.html");

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: RecordStore,
    relay: Arc<ChatRelay>,
}

/// Starts the HTTP server with the provider selected in `[chat]`.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let provider = create_provider(&config.chat)?;
    run_server_with_provider(config, provider).await
}

/// Like [`run_server`], but with a caller-supplied completion provider.
pub async fn run_server_with_provider(
    config: &Config,
    provider: Arc<dyn CompletionProvider>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = build_router(config, provider);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(
        "project log server listening on http://{}",
        listener.local_addr()?
    );
    axum::serve(listener, app).await?;

    Ok(())
}

/// Assembles the router with CORS and request tracing.
pub fn build_router(config: &Config, provider: Arc<dyn CompletionProvider>) -> Router {
    let store = RecordStore::from_config(config);
    let relay = ChatRelay::new(
        store.clone(),
        provider,
        config.chat.max_history,
        config.summary.default_window_days,
    );
    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        relay: Arc::new(relay),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_chat_page))
        .route("/chat", post(handle_chat))
        .route("/reset", post(handle_reset))
        .route("/log_meeting", post(handle_log_meeting))
        .route("/log_requirement", post(handle_log_requirement))
        .route("/log_milestone", post(handle_log_milestone))
        .route("/project_summary", get(handle_project_summary))
        .route("/export_project_report", get(handle_export_report))
        .route("/project_context", get(handle_project_context))
        .route("/health", get(handle_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn storage_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "storage_error",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

/// Runs a core operation on the blocking pool.
async fn run_blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> LogResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(AppError::from),
        Err(e) => {
            error!(error = %e, "blocking task failed");
            Err(internal("request processing failed"))
        }
    }
}

impl From<LogError> for AppError {
    fn from(err: LogError) -> Self {
        if err.is_client_error() {
            bad_request(err.to_string())
        } else {
            error!(error = %err, "storage failure");
            storage_error(err.to_string())
        }
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyQuery => bad_request(err.to_string()),
            ChatError::Disabled => AppError {
                status: StatusCode::BAD_REQUEST,
                code: "chat_disabled",
                message: "chat is disabled: set [chat].provider in the config".to_string(),
            },
            ChatError::Upstream(_) => {
                warn!(error = %err, "completion provider failed");
                AppError {
                    status: StatusCode::BAD_GATEWAY,
                    code: "upstream_error",
                    message: err.to_string(),
                }
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /log_* ============

#[derive(Serialize)]
struct LogResponse {
    status: &'static str,
    id: String,
    message: String,
}

async fn log_record<R: LogRecord>(
    state: &AppState,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
    label: &str,
) -> Result<Json<LogResponse>, AppError> {
    let Json(value) = payload?;
    let store = state.store.clone();
    let id = run_blocking(move || {
        let record: R = record_from_json(value, Utc::now())?;
        store.write(record)
    })
    .await?;
    Ok(Json(LogResponse {
        status: "success",
        id,
        message: format!("{} logged successfully", label),
    }))
}

async fn handle_log_meeting(
    State(state): State<AppState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<LogResponse>, AppError> {
    log_record::<MeetingRecord>(&state, payload, "Meeting").await
}

async fn handle_log_requirement(
    State(state): State<AppState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<LogResponse>, AppError> {
    log_record::<RequirementChangeRecord>(&state, payload, "Requirement change").await
}

async fn handle_log_milestone(
    State(state): State<AppState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<LogResponse>, AppError> {
    log_record::<MilestoneRecord>(&state, payload, "Milestone").await
}

// ============ GET /project_summary, /export_project_report ============

#[derive(Deserialize)]
struct WindowQuery {
    days: Option<i64>,
}

impl WindowQuery {
    fn days_or_default(&self, config: &Config) -> i64 {
        self.days.unwrap_or(config.summary.default_window_days)
    }
}

async fn handle_project_summary(
    State(state): State<AppState>,
    query: Result<Query<WindowQuery>, QueryRejection>,
) -> Result<Json<ProjectSummary>, AppError> {
    let Query(query) = query?;
    let days = query.days_or_default(&state.config);
    let store = state.store.clone();
    let summary = run_blocking(move || summarize(&store, Utc::now(), days)).await?;
    Ok(Json(summary))
}

#[derive(Serialize)]
struct ExportResponse {
    status: &'static str,
    report_id: String,
    report_path: String,
    counts: RecordCounts,
}

async fn handle_export_report(
    State(state): State<AppState>,
    query: Result<Query<WindowQuery>, QueryRejection>,
) -> Result<Json<ExportResponse>, AppError> {
    let Query(query) = query?;
    let days = query.days_or_default(&state.config);
    let store = state.store.clone();
    let (report, path) = run_blocking(move || {
        let report = export_window(&store, Utc::now(), days)?;
        let path = report_path(&store, &report.id);
        Ok((report, path))
    })
    .await?;

    Ok(Json(ExportResponse {
        status: "success",
        report_id: report.id,
        report_path: path.display().to_string(),
        counts: report.summary.counts,
    }))
}

// ============ GET /project_context ============

#[derive(Deserialize)]
struct ContextQuery {
    category: Option<String>,
}

/// Without `category`: the rendered chat context. With it: the in-window
/// records whose content mentions the term.
async fn handle_project_context(
    State(state): State<AppState>,
    query: Result<Query<ContextQuery>, QueryRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Query(query) = query?;
    let store = state.store.clone();
    let days = state.config.summary.default_window_days;

    let body = run_blocking(move || {
        let summary = summarize(&store, Utc::now(), days)?;
        match query.category {
            Some(term) => Ok(serde_json::to_value(filter_by_term(&summary, &term)?)?),
            None => Ok(serde_json::json!({ "context": render_context(&summary) })),
        }
    })
    .await?;
    Ok(Json(body))
}

// ============ Chat ============

async fn handle_chat_page() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

#[derive(Deserialize)]
struct ChatRequest {
    query: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, AppError> {
    let Json(request) = payload?;
    Ok(Json(state.relay.ask(&request.query).await?))
}

#[derive(Serialize)]
struct ResetResponse {
    status: &'static str,
    message: &'static str,
}

async fn handle_reset(State(state): State<AppState>) -> Json<ResetResponse> {
    state.relay.reset();
    Json(ResetResponse {
        status: "success",
        message: "Conversation history cleared",
    })
}
