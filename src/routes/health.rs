use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct LanguagesResponse {
    pub total_languages: usize,
    pub available_languages: Vec<String>,
    pub note: String,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let language_count = match state.languages.available_languages().await {
        Ok(languages) => languages.len(),
        Err(e) => {
            warn!("Health check could not list OCR languages: {}", e);
            0
        }
    };

    Json(json!({
        "status": "healthy",
        "message": "Document extraction API is running",
        "ocr_languages_available": language_count,
        "endpoints": {
            "/health": "GET - Service status",
            "/languages": "GET - View all available OCR languages",
            "/extract": "POST - Extract text from any supported file (multipart field 'file', optional 'format' and 'verbose')",
            "/extract/docx": "POST - Extract text, tables, headers and footers from a DOCX file",
        }
    }))
}

pub async fn available_languages(State(state): State<Arc<AppState>>) -> Json<Value> {
    match state.languages.available_languages().await {
        Ok(languages) => Json(json!(LanguagesResponse {
            total_languages: languages.len(),
            available_languages: languages,
            note: "These are all languages supported by the installed OCR engine".to_string(),
        })),
        Err(e) => {
            warn!("Could not list OCR languages: {}", e);
            Json(json!({
                "error": format!("Could not retrieve languages: {}", e),
                "note": "The OCR engine may not be installed correctly",
            }))
        }
    }
}
