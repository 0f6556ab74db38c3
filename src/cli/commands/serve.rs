//! HTTP API server for the farmer assistant.
//!
//! Exposes question answering, knowledge-base search and ingestion, and the
//! field and irrigation records behind them.

use crate::cli::Output;
use crate::config::Settings;
use crate::error::AgribotError;
use crate::farmer::{NewField, NewIrrigation};
use crate::orchestrator::Orchestrator;
use crate::rag::DEFAULT_HISTORY_LIMIT;
use crate::vector_store::{validate_limit, DEFAULT_SEARCH_LIMIT};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, ingest: bool, settings: Settings) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(settings).await?;
    orchestrator.initialize().await?;

    if ingest {
        let spinner = Output::spinner("Ingesting configured documents...");
        let result = orchestrator.ingest_configured().await;
        spinner.finish_and_clear();
        match result {
            Ok(report) => Output::success(&format!(
                "Indexed {} chunks from {} files",
                report.chunks_indexed,
                report.loaded_files.len()
            )),
            // The existing index is still usable.
            Err(e) => Output::warning(&format!("Startup ingestion failed: {}", e)),
        }
    }

    let app = router(Arc::new(AppState { orchestrator }));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("AgriBot API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Ask", "POST /chatbot/query");
    Output::kv("History", "GET  /chatbot/history/{user_id}");
    Output::kv("Search", "POST /search");
    Output::kv("Ingest", "POST /ingest");
    Output::kv("Fields", "POST /fields, GET /fields/{user_id}");
    Output::kv("Humidity", "PUT  /fields/{id}/humidity");
    Output::kv("Irrigation", "POST /irrigation, GET /irrigation/{user_id}");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/chatbot/query", post(chatbot_query))
        .route("/chatbot/history/{user_id}", get(chatbot_history))
        .route("/search", post(search))
        .route("/ingest", post(ingest))
        .route("/fields", post(create_field))
        .route("/fields/{user_id}", get(list_fields))
        .route("/fields/{id}/humidity", put(update_humidity))
        .route("/irrigation", post(log_irrigation))
        .route("/irrigation/{user_id}", get(irrigation_history))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct QueryRequest {
    user_id: String,
    #[serde(default)]
    query: Option<String>,
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_search_limit")]
    limit: i64,
}

fn default_search_limit() -> i64 {
    DEFAULT_SEARCH_LIMIT as i64
}

#[derive(Deserialize, Default)]
struct IngestRequest {
    #[serde(default)]
    directory: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HumidityRequest {
    current_humidity: f64,
}

#[derive(Deserialize)]
struct LimitParams {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// === Error mapping ===

fn status_for(err: &AgribotError) -> StatusCode {
    match err {
        AgribotError::Provider(_) | AgribotError::Generation(_) => StatusCode::BAD_GATEWAY,
        AgribotError::DataUnavailable(_) => StatusCode::NOT_FOUND,
        AgribotError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: AgribotError, fallback: &str) -> Response {
    let status = status_for(&err);
    // Provider text and internal failures stay in the log.
    let message = match status {
        StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => err.to_string(),
        _ => {
            error!("{}: {}", fallback, err);
            fallback.to_string()
        }
    };
    (status, Json(ErrorResponse { error: message })).into_response()
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn chatbot_query(State(state): State<Arc<AppState>>, Json(req): Json<QueryRequest>) -> Response {
    let query = match req.query.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => q.to_string(),
        _ => return bad_request("Query is required"),
    };

    match state.orchestrator.answer(&req.user_id, &query).await {
        Ok(answer) => Json(answer).into_response(),
        Err(e) => error_response(e, "Failed to process your query"),
    }
}

async fn chatbot_history(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<LimitParams>,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    match state.orchestrator.history(&user_id, limit) {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => error_response(e, "Failed to fetch conversation history"),
    }
}

async fn search(State(state): State<Arc<AppState>>, Json(req): Json<SearchRequest>) -> Response {
    let limit = match validate_limit(req.limit) {
        Ok(limit) => limit,
        Err(e) => return error_response(e, "Search failed"),
    };

    match state.orchestrator.search(&req.query, limit).await {
        Ok(results) => Json(serde_json::json!({ "results": results })).into_response(),
        Err(e) => error_response(e, "Search failed"),
    }
}

/// Resolve the directory an ingest request may read. Relative paths are taken from
/// `documents_dir`, and the result must stay inside it once symlinks and `..` are resolved.
async fn resolve_ingest_dir(
    requested: Option<&str>,
    documents_dir: &std::path::Path,
) -> std::result::Result<PathBuf, String> {
    let root = tokio::fs::canonicalize(documents_dir)
        .await
        .map_err(|_| format!("Directory not found: {}", documents_dir.display()))?;

    let Some(requested) = requested else {
        return Ok(root);
    };
    let candidate = documents_dir.join(Settings::expand_path(requested));
    let dir = tokio::fs::canonicalize(&candidate)
        .await
        .map_err(|_| format!("Directory not found: {}", requested))?;

    if !dir.starts_with(&root) {
        return Err(format!("Directory must be inside {}", root.display()));
    }
    if !dir.is_dir() {
        return Err(format!("Not a directory: {}", requested));
    }
    Ok(dir)
}

async fn ingest(State(state): State<Arc<AppState>>, body: Option<Json<IngestRequest>>) -> Response {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let documents_dir = state.orchestrator.settings().documents_dir();
    let dir = match resolve_ingest_dir(req.directory.as_deref(), &documents_dir).await {
        Ok(dir) => dir,
        Err(message) => {
            warn!("Rejected ingest request: {}", message);
            return bad_request(&message);
        }
    };

    info!("Ingest requested for {}", dir.display());
    match state.orchestrator.ingest_directory(&dir).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(e, "Ingestion failed"),
    }
}

async fn create_field(State(state): State<Arc<AppState>>, Json(field): Json<NewField>) -> Response {
    match state.orchestrator.farmers().add_field(field) {
        Ok(field) => (StatusCode::CREATED, Json(field)).into_response(),
        Err(e) => error_response(e, "Failed to create field"),
    }
}

async fn list_fields(State(state): State<Arc<AppState>>, Path(user_id): Path<String>) -> Response {
    match state.orchestrator.farmers().list_fields(&user_id) {
        Ok(fields) => Json(fields).into_response(),
        Err(e) => error_response(e, "Failed to fetch fields"),
    }
}

async fn update_humidity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<HumidityRequest>,
) -> Response {
    match state.orchestrator.farmers().update_humidity(id, req.current_humidity) {
        Ok(update) => Json(update).into_response(),
        Err(e) => error_response(e, "Failed to update humidity"),
    }
}

async fn log_irrigation(State(state): State<Arc<AppState>>, Json(run): Json<NewIrrigation>) -> Response {
    match state.orchestrator.farmers().log_irrigation(run) {
        Ok(log) => (StatusCode::CREATED, Json(log)).into_response(),
        Err(e) => error_response(e, "Failed to log irrigation"),
    }
}

async fn irrigation_history(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<LimitParams>,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    match state.orchestrator.farmers().recent_irrigation(&user_id, limit) {
        Ok(logs) => Json(logs).into_response(),
        Err(e) => error_response(e, "Failed to fetch irrigation logs"),
    }
}
