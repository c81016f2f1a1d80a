use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OcrError {
    #[error("Tesseract is not installed or not on PATH: {details}")]
    TesseractNotInstalled { details: String },

    #[error("Tesseract library support was not compiled into this build (enable the `ocr` feature)")]
    LibraryNotCompiled,

    #[error("Failed to initialize OCR engine: {details}")]
    InitializationFailed { details: String },

    #[error("OCR recognition failed: {details}")]
    RecognitionFailed { details: String },

    #[error("Invalid image: {details}")]
    InvalidImageFormat { details: String },

    #[error("OCR worker failed: {details}")]
    WorkerFailed { details: String },

    #[error("OCR did not finish any pass before the deadline")]
    DeadlineExceeded,
}

impl OcrError {
    /// True when the engine itself is missing, as opposed to failing on this input
    pub fn is_engine_unavailable(&self) -> bool {
        matches!(
            self,
            OcrError::TesseractNotInstalled { .. } | OcrError::LibraryNotCompiled
        )
    }
}
