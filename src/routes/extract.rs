use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, info, warn};

use crate::extraction::error::ExtractionError;
use crate::extraction::render::{render_tabular, tabular_filename};
use crate::models::{ExtractionRequest, OutputFormat};
use crate::routes::error_response;
use crate::utils::file_type::extract_extension;
use crate::utils::security::secure_filename;
use crate::AppState;

/// Fields read from an extraction form
#[derive(Debug, Default)]
struct UploadForm {
    filename: Option<String>,
    bytes: Option<Vec<u8>>,
    format: Option<String>,
    verbose: bool,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, Response> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| error_response(e.status(), format!("Invalid multipart body: {}", e.body_text()), None))?
    {
        match field.name() {
            Some("file") => {
                form.filename = Some(field.file_name().unwrap_or_default().to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| error_response(e.status(), format!("Failed to read file: {}", e.body_text()), None))?;
                form.bytes = Some(data.to_vec());
            }
            Some("format") => {
                form.format = Some(field.text().await.map_err(|e| {
                    error_response(StatusCode::BAD_REQUEST, format!("Invalid format field: {}", e), None)
                })?);
            }
            Some("verbose") => {
                let value = field.text().await.unwrap_or_default();
                form.verbose = matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on");
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Validate the upload and return its sanitised filename and bytes
fn take_upload(form: &mut UploadForm) -> Result<(String, Vec<u8>), Response> {
    let (Some(original), Some(bytes)) = (form.filename.take(), form.bytes.take()) else {
        return Err(error_response(StatusCode::BAD_REQUEST, "No file provided", None));
    };
    if original.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "No file selected", None));
    }
    let Some(filename) = secure_filename(&original) else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid filename: '{}'", original),
            None,
        ));
    };
    Ok((filename, bytes))
}

pub async fn extract_document(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let mut form = match read_form(multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };
    let (filename, bytes) = match take_upload(&mut form) {
        Ok(upload) => upload,
        Err(response) => return response,
    };

    let output_format: OutputFormat = match form.format.as_deref().unwrap_or("json").parse() {
        Ok(format) => format,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("{}", e), None),
    };

    info!("Extract request: {} ({} bytes, {:?})", filename, bytes.len(), output_format);

    let request = ExtractionRequest::new(filename, bytes)
        .with_output_format(output_format)
        .verbose(form.verbose);

    let result = match state.extraction.extract(request).await {
        Ok(result) => result,
        Err(e @ ExtractionError::UnsupportedFormat { .. }) => {
            warn!("{}", e);
            return error_response(StatusCode::BAD_REQUEST, e.to_string(), None);
        }
    };

    match output_format {
        OutputFormat::Structured => Json(result).into_response(),
        OutputFormat::Tabular => match render_tabular(&result) {
            Ok(csv) => (
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", tabular_filename(&result.filename)),
                    ),
                ],
                csv,
            )
                .into_response(),
            Err(e) => {
                error!("Failed to render CSV for {}: {}", result.filename, e);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to render CSV output", None)
            }
        },
    }
}

pub async fn extract_docx(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let mut form = match read_form(multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };
    let (filename, bytes) = match take_upload(&mut form) {
        Ok(upload) => upload,
        Err(response) => return response,
    };

    let extension = extract_extension(&filename);
    if extension != "docx" {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("This endpoint only accepts DOCX files. Received: {}", extension),
            Some("Use /extract for other file types or convert DOC to DOCX"),
        );
    }

    let request = ExtractionRequest::new(filename, bytes).verbose(form.verbose);
    match state.extraction.extract(request).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string(), None),
    }
}
