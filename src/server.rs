//! HTTP API over the ingest and query entry points.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/documents` | Every indexed document |
//! | `POST` | `/documents?filename=..&tags=..` | Ingest the raw request body |
//! | `GET`  | `/documents/{key}` | One document by index key or id |
//! | `GET`  | `/documents/{key}/original` | Stored original image |
//! | `GET`  | `/documents/{key}/thumbnail` | Stored thumbnail |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "document not found: 7" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `storage` (500),
//! `index_corrupt` (500), `index_locked` (503), `internal` (500).
//!
//! Ingests are handled one at a time per process; the index lock keeps
//! separate processes from racing on key assignment.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::HomeDocsError;
use crate::ingest::IngestService;
use crate::list::{find_document, list_documents, ListedDocument};
use crate::models::IndexEntry;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    service: Arc<IngestService>,
    /// Serializes ingests within this process.
    ingest_gate: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(service: Arc<IngestService>) -> Self {
        Self {
            service,
            ingest_gate: Arc::new(Mutex::new(())),
        }
    }
}

/// Builds the router; used by [`run_server`] and by tests.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/documents", get(handle_list).post(handle_upload))
        .route("/documents/{key}", get(handle_get))
        .route("/documents/{key}/original", get(handle_original))
        .route("/documents/{key}/thumbnail", get(handle_thumbnail))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = Arc::new(IngestService::from_config(config)?);
    service.prepare()?;

    let app = router(AppState::new(service), config.server.max_upload_bytes);

    let bind_addr = &config.server.bind;
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    println!("HomeDocs server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
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

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

impl From<HomeDocsError> for AppError {
    fn from(err: HomeDocsError) -> Self {
        let code = err.code();
        let status = match code {
            "bad_request" => StatusCode::BAD_REQUEST,
            "index_locked" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError {
            status,
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

/// Resolves a key or id to a document, or a 404 when there is none.
fn lookup(state: &AppState, key: &str) -> Result<ListedDocument, AppError> {
    find_document(state.service.index(), key)?
        .ok_or_else(|| not_found(format!("document not found: {}", key)))
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

// ============ GET /documents ============

#[derive(Serialize)]
struct DocumentListResponse {
    documents: Vec<ListedDocument>,
}

async fn handle_list(State(state): State<AppState>) -> Result<Json<DocumentListResponse>, AppError> {
    let documents = list_documents(state.service.index())?;
    Ok(Json(DocumentListResponse { documents }))
}

// ============ POST /documents ============

#[derive(Deserialize)]
struct UploadParams {
    filename: Option<String>,
    #[serde(default)]
    tags: String,
}

/// Ingests the raw request body as one image.
async fn handle_upload(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<(StatusCode, Json<IndexEntry>), AppError> {
    if body.is_empty() {
        return Err(bad_request("request body must not be empty"));
    }
    let filename = params
        .filename
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| "upload.jpg".to_string());

    let _gate = state.ingest_gate.lock().await;
    let entry = state
        .service
        .ingest(&body, &filename, &params.tags)
        .await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

// ============ GET /documents/{key} ============

async fn handle_get(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ListedDocument>, AppError> {
    Ok(Json(lookup(&state, &key)?))
}

// ============ GET /documents/{key}/original|thumbnail ============

async fn handle_original(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let doc = lookup(&state, &key)?;
    serve_image(&doc.record.full_path).await
}

async fn handle_thumbnail(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let doc = lookup(&state, &key)?;
    serve_image(&doc.record.thumbnail_path).await
}

async fn serve_image(path: &str) -> Result<Response, AppError> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(([(header::CONTENT_TYPE, "image/jpeg")], data).into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(not_found(format!("file missing on disk: {}", path)))
        }
        Err(e) => Err(HomeDocsError::Io(e).into()),
    }
}
