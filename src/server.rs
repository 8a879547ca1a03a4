//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/api/repo-qa` | Ingest a repository and answer one question |
//!
//! `POST /api/repo-qa` takes `{"repo": "...", "question": "...", "top_k": 5}`
//! (`top_k` optional) and returns:
//!
//! ```json
//! {
//!   "repo": "octo/hello",
//!   "files_indexed": 12,
//!   "chunks_indexed": 40,
//!   "status": "answered",
//!   "answer": "The entry point is `src/main.rs` ..."
//! }
//! ```
//!
//! `status` is `answered`, `not_ready` (nothing indexable in the repository)
//! or `failed` (generation error; `answer` holds `Error: <reason>`).
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400, including a local repository outside
//! `[ingest] local_root`), `upstream_error` (502, the repository could not
//! be read or embedded).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn, Instrument};

use crate::config::Config;
use crate::qa::QaService;

#[derive(Clone)]
struct AppState {
    service: QaService,
    default_top_k: usize,
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config, service: QaService) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(service, config.retrieval.top_k);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "repo-qa server listening");
    println!("Repo QA server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// The application router, without a listener. Used by `run_server` and
/// in tests.
pub fn router(service: QaService, default_top_k: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/repo-qa", post(handle_repo_qa))
        .layer(cors)
        .with_state(AppState {
            service,
            default_top_k,
        })
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

fn upstream_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "upstream_error".to_string(),
        message: message.into(),
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

// ============ POST /api/repo-qa ============

#[derive(Debug, Deserialize)]
struct RepoQaRequest {
    repo: String,
    question: String,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
struct RepoQaResponse {
    repo: String,
    files_indexed: usize,
    chunks_indexed: usize,
    status: &'static str,
    answer: String,
}

async fn handle_repo_qa(
    State(state): State<AppState>,
    Json(req): Json<RepoQaRequest>,
) -> Result<Json<RepoQaResponse>, AppError> {
    if req.repo.trim().is_empty() {
        return Err(bad_request("repo must not be empty"));
    }
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    let top_k = req.top_k.unwrap_or(state.default_top_k);
    if top_k == 0 {
        return Err(bad_request("top_k must be >= 1"));
    }

    let repo = state
        .service
        .normalize_repo(&req.repo)
        .map_err(|e| bad_request(e.to_string()))?;

    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("repo_qa", %request_id, repo = %repo);

    let outcome = state
        .service
        .ask(&repo, &req.question, top_k)
        .instrument(span)
        .await
        .map_err(|e| {
            warn!(%request_id, error = %format!("{e:#}"), "ingestion failed");
            upstream_error(format!("{e:#}"))
        })?;

    Ok(Json(RepoQaResponse {
        repo: outcome.repo,
        files_indexed: outcome.report.files_indexed,
        chunks_indexed: outcome.report.chunks_indexed,
        status: outcome.answer.status(),
        answer: outcome.answer.to_string(),
    }))
}
