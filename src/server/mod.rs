//! HTTP daemon/server mode for `scoutdb`.
//!
//! This module exposes a small HTTP+JSON API over a single shared
//! engine:
//!
//! - `POST /v1/import` – accepts an `ImportRequest` and indexes its documents.
//! - `POST /v1/delete` – accepts a `DeleteRequest`.
//! - `POST /v1/flush` – accepts a `FlushRequest`.
//! - `POST /v1/search` – accepts a `SearchRequest` and returns a `SearchResponse`.
//! - `GET /v1/index/info` – returns an `IndexSummary`.
//! - `GET /v1/health` – simple health check endpoint.
//!
//! The server is intentionally thin: it performs JSON
//! (de)serialization, delegates to the engine, and converts errors
//! into JSON HTTP responses.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::engine::{Engine, SqliteEngine};
use crate::error::ScoutError;
use crate::index::{self, IndexDatabase};
use crate::models::{
    DeleteRequest, Document, FlushRequest, ImportRequest, IndexSummary, MutationSummary,
    SearchRequest, SearchResponse, SEARCH_RESULT_VERSION,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<SqliteEngine>,
    db: Arc<IndexDatabase>,
}

impl AppState {
    pub fn new(engine: Arc<SqliteEngine>, db: Arc<IndexDatabase>) -> Self {
        Self { engine, db }
    }
}

/// Simple health-check response payload.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// JSON error body returned by the API.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Error type used by HTTP handlers to map internal failures into
/// JSON error responses.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<ScoutError> for ApiError {
    fn from(err: ScoutError) -> Self {
        match err {
            ScoutError::InvalidQuery(_) | ScoutError::Config(_) => {
                ApiError::bad_request(err.to_string())
            }
            ScoutError::IndexNotFound(_) => Self {
                status: StatusCode::NOT_FOUND,
                message: err.to_string(),
            },
            other => {
                warn!(error = %other, "request failed");
                ApiError::internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Build the Axum router for the scoutdb HTTP API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/import", post(import))
        .route("/v1/delete", post(delete))
        .route("/v1/flush", post(flush))
        .route("/v1/search", post(search))
        .route("/v1/index/info", get(index_info))
        .with_state(state)
}

/// Run the HTTP server bound to the provided socket address.
///
/// This is used by the CLI `scoutdb serve` subcommand.
pub async fn run(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_with_listener(listener, state).await
}

/// Run the HTTP server using an existing `TcpListener`.
///
/// This is primarily used in tests to bind to an ephemeral port.
pub async fn serve_with_listener(listener: TcpListener, state: AppState) -> Result<()> {
    info!(addr = %listener.local_addr()?, "serving HTTP API");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn import(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<MutationSummary>, ApiError> {
    if let Some(doc) = request.documents.iter().find(|d| d.doc_type.is_empty()) {
        return Err(ApiError::bad_request(format!(
            "document {} has no type",
            doc.id
        )));
    }

    let documents = request.documents;
    let count = documents.len() as u64;
    let engine = state.engine.clone();
    run_blocking(move || engine.update(&documents)).await?;

    Ok(Json(MutationSummary {
        operation: "import".to_string(),
        doc_type: None,
        documents: count,
    }))
}

async fn delete(
    State(state): State<AppState>,
    Json(request): Json<DeleteRequest>,
) -> Result<Json<MutationSummary>, ApiError> {
    let documents: Vec<Document> = request
        .ids
        .iter()
        .map(|id| Document::new(request.doc_type.clone(), id.clone()))
        .collect();

    let count = documents.len() as u64;
    let engine = state.engine.clone();
    run_blocking(move || engine.delete(&documents)).await?;

    Ok(Json(MutationSummary {
        operation: "delete".to_string(),
        doc_type: Some(request.doc_type),
        documents: count,
    }))
}

async fn flush(
    State(state): State<AppState>,
    Json(request): Json<FlushRequest>,
) -> Result<Json<MutationSummary>, ApiError> {
    let doc_type = request.doc_type.clone();
    let engine = state.engine.clone();
    run_blocking(move || engine.flush(doc_type.as_str())).await?;

    Ok(Json(MutationSummary {
        operation: "flush".to_string(),
        doc_type: Some(request.doc_type),
        documents: 0,
    }))
}

async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let SearchRequest { builder, page } = request;
    let engine = state.engine.clone();
    let response = run_blocking(move || {
        let result = match page {
            Some(page) => engine.paginate(&builder, page.per_page, page.page)?,
            None => engine.search(&builder)?,
        };
        Ok(SearchResponse {
            version: SEARCH_RESULT_VERSION.to_string(),
            ids: engine.map_ids(&result),
            total: engine.total_count(&result),
            model: builder.model,
            query: builder.query,
            documents: None,
        })
    })
    .await?;

    Ok(Json(response))
}

async fn index_info(State(state): State<AppState>) -> Result<Json<IndexSummary>, ApiError> {
    let db = state.db.clone();
    let summary = run_blocking(move || index::summarize(&db)).await?;
    Ok(Json(summary))
}

/// Run a synchronous engine call on tokio's blocking pool so SQLite
/// work never stalls the async workers.
async fn run_blocking<T, F>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| ApiError::internal(format!("blocking task failed: {err}")))?
        .map_err(ApiError::from)
}
