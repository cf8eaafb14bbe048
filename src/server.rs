//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/documents` | Ingested documents, newest first |
//! | `POST` | `/upload?filename=NAME` | Ingest a raw PDF request body |
//! | `POST` | `/search` | Run retrieval only; body `{"query": "..."}` |
//! | `POST` | `/ask` | Retrieval plus generation; body `{"query": "..."}` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unprocessable` (422),
//! `embedding_failed` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser UI served
//! from another origin can call the API.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use pdf_qa_core::error::{EmbedError, SearchError};
use pdf_qa_core::models::{DocumentSummary, SearchResult};

use crate::ask::{ask, AskResponse};
use crate::documents::list_documents;
use crate::extract::ExtractError;
use crate::ingest::{ingest_pdf, IngestReport};
use crate::services::Services;

/// Starts the HTTP server on `[server].bind`. Runs until the process ends.
pub async fn run_server(services: Services) -> anyhow::Result<()> {
    let bind_addr = services.config.server.bind.clone();
    let app = router(services);

    tracing::info!(addr = %bind_addr, "HTTP server listening");
    println!("pdfqa server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router. Exposed for in-process tests.
pub fn router(services: Services) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    // Leave room above the ingest limit so oversize uploads get a JSON error
    let body_limit = services.config.ingest.max_file_bytes.saturating_add(1024 * 1024);

    Router::new()
        .route("/health", get(handle_health))
        .route("/documents", get(handle_documents))
        .route("/upload", post(handle_upload))
        .route("/search", post(handle_search))
        .route("/ask", post(handle_ask))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(services)
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

/// Map a pipeline error to its HTTP shape by inspecting the typed cause.
fn classify_error(err: anyhow::Error) -> AppError {
    let message = format!("{:#}", err);

    if let Some(SearchError::EmptyQuery) = err.downcast_ref::<SearchError>() {
        return bad_request(message);
    }
    if matches!(err.downcast_ref::<SearchError>(), Some(SearchError::Embedding(_)))
        || err.downcast_ref::<EmbedError>().is_some()
    {
        return AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "embedding_failed",
            message,
        };
    }
    if let Some(extract) = err.downcast_ref::<ExtractError>() {
        return match extract {
            ExtractError::NotPdf(_) | ExtractError::TooLarge { .. } => bad_request(message),
            ExtractError::Pdf(_) | ExtractError::NoText(_) => AppError {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                code: "unprocessable",
                message,
            },
        };
    }

    tracing::error!(error = %message, "Request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message,
    }
}

// ============ Handlers ============

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

#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<DocumentSummary>,
}

async fn handle_documents(
    State(services): State<Services>,
) -> Result<Json<DocumentsResponse>, AppError> {
    let documents = list_documents(&services).await.map_err(classify_error)?;
    Ok(Json(DocumentsResponse { documents }))
}

#[derive(Deserialize)]
struct UploadParams {
    filename: Option<String>,
}

async fn handle_upload(
    State(services): State<Services>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<IngestReport>, AppError> {
    let filename = params
        .filename
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| bad_request("filename query parameter is required"))?;
    if body.is_empty() {
        return Err(bad_request("request body must contain the PDF bytes"));
    }

    let report = ingest_pdf(&services, filename.trim(), &body)
        .await
        .map_err(classify_error)?;
    Ok(Json(report))
}

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    query: String,
}

async fn handle_search(
    State(services): State<Services>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<SearchResult>, AppError> {
    let result = services
        .engine
        .search(&req.query)
        .await
        .map_err(|e| classify_error(e.into()))?;
    Ok(Json(result))
}

async fn handle_ask(
    State(services): State<Services>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let response = ask(&services, &req.query).await.map_err(classify_error)?;
    Ok(Json(response))
}
