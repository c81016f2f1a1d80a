use anyhow::{anyhow, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::ocr::engine::QualityWeights;

/// Which tesseract integration drives the OCR passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrBackendKind {
    /// Spawn the `tesseract` binary per pass and parse its TSV output
    Cli,
    /// Link libtesseract through the `tesseract` crate (feature `ocr`)
    Library,
}

impl FromStr for OcrBackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cli" | "binary" => Ok(OcrBackendKind::Cli),
            "library" | "lib" => Ok(OcrBackendKind::Library),
            other => Err(anyhow!("Unknown OCR_BACKEND '{}': expected 'cli' or 'library'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub upload_path: PathBuf,
    pub max_file_size_mb: u64,
    pub extraction_timeout_seconds: u64,
    pub pdf_ocr_page_limit: usize,
    pub pdf_raster_dpi: u32,
    pub ocr_confidence_threshold: f32,
    pub ocr_contrast_factor: f32,
    pub ocr_confidence_weight: f32,
    pub ocr_length_weight: f32,
    pub ocr_worker_threads: Option<usize>,
    pub ocr_backend: OcrBackendKind,
    pub tessdata_prefix: Option<String>,
    /// Directory holding pdfinfo, pdftotext and pdftoppm; `PATH` lookup when unset
    pub poppler_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_address: "0.0.0.0:8000".to_string(),
            upload_path: env::temp_dir(),
            max_file_size_mb: 50,
            extraction_timeout_seconds: 300,
            pdf_ocr_page_limit: 3,
            pdf_raster_dpi: 200,
            ocr_confidence_threshold: 15.0,
            ocr_contrast_factor: 2.0,
            ocr_confidence_weight: 0.7,
            ocr_length_weight: 0.3,
            ocr_worker_threads: None,
            ocr_backend: OcrBackendKind::Cli,
            tessdata_prefix: None,
            poppler_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let config = Config {
            server_address: env::var("SERVER_ADDRESS").unwrap_or(defaults.server_address),
            upload_path: env::var("UPLOAD_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_path),
            max_file_size_mb: parse_var("MAX_FILE_SIZE_MB", defaults.max_file_size_mb)?,
            extraction_timeout_seconds: parse_var(
                "EXTRACTION_TIMEOUT_SECONDS",
                defaults.extraction_timeout_seconds,
            )?,
            pdf_ocr_page_limit: parse_var("PDF_OCR_PAGE_LIMIT", defaults.pdf_ocr_page_limit)?,
            pdf_raster_dpi: parse_var("PDF_RASTER_DPI", defaults.pdf_raster_dpi)?,
            ocr_confidence_threshold: parse_var(
                "OCR_CONFIDENCE_THRESHOLD",
                defaults.ocr_confidence_threshold,
            )?,
            ocr_contrast_factor: parse_var("OCR_CONTRAST_FACTOR", defaults.ocr_contrast_factor)?,
            ocr_confidence_weight: parse_var(
                "OCR_CONFIDENCE_WEIGHT",
                defaults.ocr_confidence_weight,
            )?,
            ocr_length_weight: parse_var("OCR_LENGTH_WEIGHT", defaults.ocr_length_weight)?,
            ocr_worker_threads: match env::var("OCR_WORKER_THREADS") {
                Ok(value) => Some(parse_value("OCR_WORKER_THREADS", &value)?),
                Err(_) => None,
            },
            ocr_backend: match env::var("OCR_BACKEND") {
                Ok(value) => value.parse()?,
                Err(_) => defaults.ocr_backend,
            },
            tessdata_prefix: env::var("TESSDATA_PREFIX").ok().filter(|s| !s.is_empty()),
            poppler_path: env::var("POPPLER_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
        };

        config.validate()?;

        info!(
            "Loaded configuration: address={}, upload_path={}, timeout={}s, pdf_ocr_page_limit={}, ocr_backend={:?}",
            config.server_address,
            config.upload_path.display(),
            config.extraction_timeout_seconds,
            config.pdf_ocr_page_limit,
            config.ocr_backend
        );

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_file_size_mb == 0 {
            return Err(anyhow!("MAX_FILE_SIZE_MB must be greater than zero"));
        }
        let max_bytes = self
            .max_file_size_mb
            .checked_mul(1024 * 1024)
            .and_then(|bytes| usize::try_from(bytes).ok());
        if max_bytes.is_none() {
            return Err(anyhow!(
                "MAX_FILE_SIZE_MB is too large, got {}",
                self.max_file_size_mb
            ));
        }
        if self.extraction_timeout_seconds == 0 {
            return Err(anyhow!("EXTRACTION_TIMEOUT_SECONDS must be greater than zero"));
        }
        // NaN fails the range check, infinity is rejected below
        if !(0.0..=100.0).contains(&self.ocr_confidence_threshold) {
            return Err(anyhow!(
                "OCR_CONFIDENCE_THRESHOLD must be within 0-100, got {}",
                self.ocr_confidence_threshold
            ));
        }
        if !self.ocr_contrast_factor.is_finite() || self.ocr_contrast_factor <= 0.0 {
            return Err(anyhow!(
                "OCR_CONTRAST_FACTOR must be a positive number, got {}",
                self.ocr_contrast_factor
            ));
        }
        for (name, weight) in [
            ("OCR_CONFIDENCE_WEIGHT", self.ocr_confidence_weight),
            ("OCR_LENGTH_WEIGHT", self.ocr_length_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(anyhow!("{} must be a non-negative number, got {}", name, weight));
            }
        }
        if self.ocr_worker_threads == Some(0) {
            return Err(anyhow!("OCR_WORKER_THREADS must be at least 1"));
        }
        Ok(())
    }

    pub fn max_file_size_bytes(&self) -> usize {
        usize::try_from(self.max_file_size_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_seconds)
    }

    pub fn quality_weights(&self) -> QualityWeights {
        QualityWeights {
            confidence: self.ocr_confidence_weight,
            length: self.ocr_length_weight,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => parse_value(name, &value),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| anyhow!("Invalid value for {}: '{}' ({})", name, value, e))
}
