use std::fmt;
use thiserror::Error;

use crate::ocr::error::OcrError;

/// Errors that reject a request before any extraction starts
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file type '{extension}' for '{filename}'. Supported extensions: {supported}")]
    UnsupportedFormat {
        filename: String,
        extension: String,
        supported: String,
    },
}

/// Why a parse failed on this particular input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseCause {
    Corrupted,
    PasswordProtected,
    UnsupportedVersion,
}

impl fmt::Display for ParseCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCause::Corrupted => write!(f, "Document appears to be corrupted"),
            ParseCause::PasswordProtected => write!(f, "Document is password-protected or encrypted"),
            ParseCause::UnsupportedVersion => write!(f, "Document format version is not supported"),
        }
    }
}

/// A failure recorded on an extraction result rather than returned to the caller
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionFailure {
    #[error("{cause}: {detail}")]
    ParseFailure { cause: ParseCause, detail: String },

    #[error("{capability} is not available: {detail}")]
    EngineUnavailable { capability: String, detail: String },

    #[error("{format} extraction is not available")]
    CapabilityUnavailable { format: String },

    #[error("Extraction did not finish within {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("OCR engine failed: {0}")]
    Engine(String),

    #[error("I/O error while processing upload: {0}")]
    Io(String),
}

impl ExtractionFailure {
    pub fn parse(cause: ParseCause, detail: impl Into<String>) -> Self {
        ExtractionFailure::ParseFailure {
            cause,
            detail: detail.into(),
        }
    }

    pub fn corrupted(detail: impl Into<String>) -> Self {
        Self::parse(ParseCause::Corrupted, detail)
    }

    /// Tells the caller whether the deployment or the input is at fault
    pub fn note(&self) -> &'static str {
        match self {
            ExtractionFailure::EngineUnavailable { .. } | ExtractionFailure::CapabilityUnavailable { .. } => {
                "not supported by this deployment"
            }
            ExtractionFailure::Timeout { .. } => "extraction timed out",
            _ => "extraction failed on this input",
        }
    }

    pub fn from_ocr(error: OcrError, timeout_seconds: u64) -> Self {
        match error {
            e if e.is_engine_unavailable() => ExtractionFailure::EngineUnavailable {
                capability: "OCR engine (tesseract)".to_string(),
                detail: e.to_string(),
            },
            OcrError::DeadlineExceeded => ExtractionFailure::Timeout {
                seconds: timeout_seconds,
            },
            OcrError::InvalidImageFormat { details } => {
                ExtractionFailure::corrupted(format!("image could not be decoded: {}", details))
            }
            other => ExtractionFailure::Engine(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ExtractionFailure {
    fn from(error: std::io::Error) -> Self {
        ExtractionFailure::Io(error.to_string())
    }
}
