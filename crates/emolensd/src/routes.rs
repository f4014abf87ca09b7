//! HTTP surface of the daemon.
//!
//! `POST /process` takes `{"image": <base64>, "task": "detection" | "emotion"}`;
//! `GET /health` reports liveness. Errors come back as `{"detail": <message>}`.

use crate::engine::{EngineError, EngineHandle};
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use emolens_core::InferenceResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
pub struct AppState {
    pub engine: EngineHandle,
}

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    /// Base64 image, optionally with a `data:image/...;base64,` header.
    pub image: String,
    pub task: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Detail for every server-side failure; the cause is only logged.
const INFERENCE_FAILED: &str = "Inference failed";

/// Build the router. Static files from `frontend_dir`, when given, answer
/// every path the API does not claim.
pub fn router(state: Arc<AppState>, frontend_dir: Option<&Path>, max_body_bytes: usize) -> Router {
    let api = Router::new()
        .route("/process", post(process_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    let app = match frontend_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true)),
        None => api,
    };

    app.layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

async fn process_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProcessRequest>,
) -> Result<Json<InferenceResult>, ApiError> {
    let task = req.task.clone();
    match state.engine.process(req.image, req.task).await {
        Ok(result) => Ok(Json(result)),
        Err(EngineError::Pipeline(err)) if err.is_client_error() => {
            tracing::debug!(task = %task, error = ?err, "request rejected");
            Err(api_error(StatusCode::BAD_REQUEST, &err.to_string()))
        }
        Err(err) => {
            tracing::error!(task = %task, error = ?err, "request failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, INFERENCE_FAILED))
        }
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "backend running" }))
}

fn api_error(status: StatusCode, detail: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            detail: detail.to_string(),
        }),
    )
}
