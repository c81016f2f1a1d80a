//! Recognition backends.
//!
//! A backend runs one recognition pass over an already preprocessed image
//! and returns word-level tokens. Backends are synchronous; the engine runs
//! them on the blocking pool.

use image::GrayImage;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use tracing::debug;

use crate::config::OcrBackendKind;
use crate::ocr::error::OcrError;
use crate::ocr::passes::SegmentationMode;

#[cfg(feature = "ocr")]
use tesseract::{PageSegMode, Tesseract};

/// A recognised word with its engine confidence (0-100)
#[derive(Debug, Clone, PartialEq)]
pub struct OcrToken {
    pub text: String,
    pub confidence: f32,
}

impl OcrToken {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PassRequest<'a> {
    pub languages: &'a str,
    pub segmentation: SegmentationMode,
}

pub trait OcrBackend: Send + Sync {
    fn name(&self) -> &str;

    fn recognize(&self, image: &GrayImage, request: &PassRequest<'_>) -> Result<Vec<OcrToken>, OcrError>;
}

/// Parse word rows out of Tesseract TSV output.
///
/// Only level-5 (word) rows carry text; rows with a confidence of -1 are
/// layout rows and are skipped along with anything malformed.
pub fn parse_tsv_tokens(tsv: &str) -> Vec<OcrToken> {
    tsv.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 12 || fields[0] != "5" {
                return None;
            }
            let confidence: f32 = fields[10].trim().parse().ok()?;
            if confidence < 0.0 {
                return None;
            }
            Some(OcrToken::new(fields[11..].join("\t"), confidence))
        })
        .collect()
}

/// Runs the `tesseract` executable once per pass
#[derive(Debug, Clone)]
pub struct TesseractCliBackend {
    binary: String,
    tessdata_prefix: Option<String>,
    scratch_dir: PathBuf,
}

impl TesseractCliBackend {
    pub fn new(scratch_dir: impl Into<PathBuf>, tessdata_prefix: Option<String>) -> Self {
        Self {
            binary: "tesseract".to_string(),
            tessdata_prefix,
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

impl OcrBackend for TesseractCliBackend {
    fn name(&self) -> &str {
        "tesseract-cli"
    }

    fn recognize(&self, image: &GrayImage, request: &PassRequest<'_>) -> Result<Vec<OcrToken>, OcrError> {
        std::fs::create_dir_all(&self.scratch_dir).map_err(|e| OcrError::RecognitionFailed {
            details: format!("cannot create scratch directory: {}", e),
        })?;

        let input = tempfile::Builder::new()
            .prefix("docextract-ocr-")
            .suffix(".png")
            .tempfile_in(&self.scratch_dir)
            .map_err(|e| OcrError::RecognitionFailed {
                details: format!("cannot create scratch image: {}", e),
            })?;

        image
            .save_with_format(input.path(), image::ImageFormat::Png)
            .map_err(|e| OcrError::InvalidImageFormat {
                details: e.to_string(),
            })?;

        let mut command = Command::new(&self.binary);
        command
            .arg(input.path())
            .arg("stdout")
            .args(["--oem", "3"])
            .args(["--psm", &request.segmentation.psm().to_string()])
            .args(["-l", request.languages])
            .arg("tsv");
        if let Some(prefix) = &self.tessdata_prefix {
            command.env("TESSDATA_PREFIX", prefix);
        }

        let output = command.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OcrError::TesseractNotInstalled {
                    details: format!("'{}' executable not found", self.binary),
                }
            } else {
                OcrError::RecognitionFailed {
                    details: e.to_string(),
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::RecognitionFailed {
                details: stderr
                    .lines()
                    .find(|l| !l.trim().is_empty())
                    .unwrap_or("tesseract exited with an error")
                    .trim()
                    .to_string(),
            });
        }

        let tokens = parse_tsv_tokens(&String::from_utf8_lossy(&output.stdout));
        debug!(
            "tesseract ({}, -l {}) returned {} tokens",
            request.segmentation,
            request.languages,
            tokens.len()
        );
        Ok(tokens)
    }
}

/// Calls libtesseract in-process
#[cfg(feature = "ocr")]
#[derive(Debug, Clone)]
pub struct TesseractLibraryBackend {
    datapath: Option<String>,
}

#[cfg(feature = "ocr")]
impl TesseractLibraryBackend {
    pub fn new(datapath: Option<String>) -> Self {
        Self { datapath }
    }

    fn page_seg_mode(mode: SegmentationMode) -> PageSegMode {
        match mode {
            SegmentationMode::SingleColumn => PageSegMode::PsmSingleColumn,
            SegmentationMode::UniformBlock => PageSegMode::PsmSingleBlock,
            SegmentationMode::SingleLine => PageSegMode::PsmSingleLine,
            SegmentationMode::SparseText => PageSegMode::PsmSparseText,
        }
    }
}

#[cfg(feature = "ocr")]
impl OcrBackend for TesseractLibraryBackend {
    fn name(&self) -> &str {
        "tesseract-lib"
    }

    fn recognize(&self, image: &GrayImage, request: &PassRequest<'_>) -> Result<Vec<OcrToken>, OcrError> {
        let (width, height) = image.dimensions();

        let mut tesseract = Tesseract::new(self.datapath.as_deref(), Some(request.languages))
            .map_err(|e| OcrError::InitializationFailed {
                details: e.to_string(),
            })?
            .set_frame(image.as_raw(), width as i32, height as i32, 1, width as i32)
            .map_err(|e| OcrError::InvalidImageFormat {
                details: e.to_string(),
            })?;

        tesseract.set_page_seg_mode(Self::page_seg_mode(request.segmentation));

        let mut tesseract = tesseract.recognize().map_err(|e| OcrError::RecognitionFailed {
            details: e.to_string(),
        })?;

        let tsv = tesseract.get_tsv_text(0).map_err(|e| OcrError::RecognitionFailed {
            details: e.to_string(),
        })?;

        Ok(parse_tsv_tokens(&tsv))
    }
}

/// Build the configured backend. Asking for the in-process library in a
/// build without the `ocr` feature is a configuration error.
pub fn build_backend(
    kind: OcrBackendKind,
    scratch_dir: impl Into<PathBuf>,
    tessdata_prefix: Option<String>,
) -> Result<Arc<dyn OcrBackend>, OcrError> {
    match kind {
        OcrBackendKind::Cli => Ok(Arc::new(TesseractCliBackend::new(scratch_dir, tessdata_prefix))),
        #[cfg(feature = "ocr")]
        OcrBackendKind::Library => Ok(Arc::new(TesseractLibraryBackend::new(tessdata_prefix))),
        #[cfg(not(feature = "ocr"))]
        OcrBackendKind::Library => Err(OcrError::LibraryNotCompiled),
    }
}
