//! Retrieval HTTP service.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/rag` | Answer a question from the indexed corpus |
//! | `GET`  | `/healthz` | Liveness probe, always `{"ok": true}` |
//!
//! `POST /rag` takes `{"query": "...", "filters": {"kind": "jira"}}`
//! (`filters` optional) and returns `{"answer": "...", "chunks": [...]}`
//! with chunks in retrieval order.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `timeout` (504),
//! `generation_failed` (502).
//!
//! Retrieval problems never surface here; they degrade to the lexical
//! fallback or to an empty context.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use unified_rag_core::answer::{Answer, AnswerService};
use unified_rag_core::generation::GenerationError;
use unified_rag_core::models::SearchFilter;

use crate::backends::Backends;
use crate::config::Config;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    answers: Arc<AnswerService>,
}

/// Build the router around an answer service.
///
/// Split out from [`run_server`] so tests can serve it on an ephemeral port
/// with fake collaborators.
pub fn router(answers: Arc<AnswerService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/rag", post(handle_rag))
        .route("/healthz", get(handle_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { answers })
}

/// Serve on `[server].bind` until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let backends = Backends::from_config(config)?;
    let app = router(Arc::new(backends.answer_service()));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "retrieval service listening");
    println!("Retrieval service listening on http://{}", config.server.bind);
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

#[derive(Debug)]
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

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        let (status, code) = match err {
            GenerationError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            _ => (StatusCode::BAD_GATEWAY, "generation_failed"),
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

// ============ GET /healthz ============

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

// ============ POST /rag ============

#[derive(Deserialize)]
struct RagRequest {
    query: String,
    #[serde(default)]
    filters: Option<serde_json::Value>,
}

/// Parse the optional `filters` object. `null` and `{}` mean unrestricted.
fn parse_filters(filters: Option<serde_json::Value>) -> Result<SearchFilter, AppError> {
    match filters {
        None | Some(serde_json::Value::Null) => Ok(SearchFilter::default()),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| bad_request(format!("invalid filters: {}", e))),
    }
}

async fn handle_rag(
    State(state): State<AppState>,
    body: Result<Json<RagRequest>, JsonRejection>,
) -> Result<Json<Answer>, AppError> {
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let filter = parse_filters(req.filters)?;

    match state.answers.answer(&req.query, &filter).await {
        Ok(answer) => Ok(Json(answer)),
        Err(e) => {
            warn!(error = %e, "generation failed");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unified_rag_core::models::SourceKind;

    #[test]
    fn test_parse_filters() {
        assert!(parse_filters(None).unwrap().is_empty());
        assert!(parse_filters(Some(serde_json::Value::Null)).unwrap().is_empty());
        assert!(parse_filters(Some(serde_json::json!({}))).unwrap().is_empty());
        assert_eq!(
            parse_filters(Some(serde_json::json!({ "kind": "confluence" })))
                .unwrap()
                .kind,
            Some(SourceKind::Wiki)
        );
        let err = parse_filters(Some(serde_json::json!({ "team": "sre" }))).err().unwrap();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_generation_error_status_mapping() {
        let timeout: AppError = GenerationError::Timeout(std::time::Duration::from_secs(60)).into();
        assert_eq!(timeout.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(timeout.code, "timeout");

        let failed: AppError = GenerationError::Status {
            status: 500,
            body: "boom".to_string(),
        }
        .into();
        assert_eq!(failed.status, StatusCode::BAD_GATEWAY);
        assert_eq!(failed.code, "generation_failed");
    }
}
