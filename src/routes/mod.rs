pub mod extract;
pub mod health;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

/// Slack on top of the file limit for multipart framing and form fields
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_file_size_bytes() + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_check))
        .route("/languages", get(health::available_languages))
        .route("/extract", post(extract::extract_document))
        .route("/extract/docx", post(extract::extract_docx))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// JSON error body with an optional note
pub(crate) fn error_response(status: StatusCode, error: impl Into<String>, note: Option<&str>) -> Response {
    let body = match note {
        Some(note) => json!({ "error": error.into(), "note": note }),
        None => json!({ "error": error.into() }),
    };
    (status, Json(body)).into_response()
}
