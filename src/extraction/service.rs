//! Request dispatch: classify, stage, run the format's strategy, assemble.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::cpu_allocation::CpuAllocation;
use crate::extraction::assembler::{assemble, FileMeta};
use crate::extraction::error::{ExtractionError, ExtractionFailure};
use crate::extraction::outcome::{ExtractedContent, ExtractionOutcome};
use crate::extraction::text_decoders;
use crate::models::{ExtractionRequest, ExtractionResult, FormatKind};
use crate::ocr::backend::build_backend;
use crate::ocr::engine::{EngineSettings, MultiPassOcrEngine, OcrReport};
use crate::ocr::languages::{LanguageCatalog, TesseractLanguageCatalog};
use crate::ocr::pdf::{PdfExtractor, PdfSettings, PdfTools};
use crate::ocr::xml_extractor::XmlOfficeExtractor;
use crate::storage::{StagedUpload, UploadStaging};
use crate::utils::file_type::{classify, extract_extension, supported_extensions};

pub struct ExtractionService {
    staging: UploadStaging,
    engine: Arc<MultiPassOcrEngine>,
    pdf: PdfExtractor,
    docx: XmlOfficeExtractor,
    timeout: Duration,
}

impl ExtractionService {
    pub fn new(staging: UploadStaging, engine: Arc<MultiPassOcrEngine>, timeout: Duration) -> Self {
        let pdf = PdfExtractor::new(PdfSettings::default(), staging.upload_path())
            .with_timeout_seconds(timeout.as_secs());
        Self {
            staging,
            engine,
            pdf,
            docx: XmlOfficeExtractor::new(),
            timeout,
        }
    }

    pub fn with_pdf_settings(mut self, settings: PdfSettings) -> Self {
        self.pdf = PdfExtractor::new(settings, self.staging.upload_path())
            .with_timeout_seconds(self.timeout.as_secs())
            .with_tools(self.pdf.tools().clone());
        self
    }

    pub fn with_pdf_tools(mut self, tools: PdfTools) -> Self {
        self.pdf = self.pdf.with_tools(tools);
        self
    }

    /// Wire up the OCR backend, language catalog and worker pool from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let allocation = CpuAllocation::detect_and_allocate(config.ocr_worker_threads);
        allocation.log_allocation();

        let backend = build_backend(config.ocr_backend, &config.upload_path, config.tessdata_prefix.clone())?;
        let catalog: Arc<dyn LanguageCatalog> =
            Arc::new(TesseractLanguageCatalog::new(config.tessdata_prefix.clone()));

        let engine = MultiPassOcrEngine::new(backend, catalog, allocation.ocr_workers).with_settings(EngineSettings {
            confidence_threshold: config.ocr_confidence_threshold,
            contrast_factor: config.ocr_contrast_factor,
            weights: config.quality_weights(),
        });

        info!(
            "OCR engine ready: backend {}, {} passes, {} workers",
            engine.backend_name(),
            engine.passes().len(),
            allocation.ocr_workers
        );

        Ok(Self::new(
            UploadStaging::new(&config.upload_path),
            Arc::new(engine),
            config.extraction_timeout(),
        )
        .with_pdf_settings(PdfSettings {
            ocr_page_limit: config.pdf_ocr_page_limit,
            raster_dpi: config.pdf_raster_dpi,
        })
        .with_pdf_tools(
            config
                .poppler_path
                .as_deref()
                .map(PdfTools::in_dir)
                .unwrap_or_default(),
        ))
    }

    pub fn language_catalog(&self) -> Arc<dyn LanguageCatalog> {
        self.engine.language_catalog()
    }

    pub fn engine(&self) -> &MultiPassOcrEngine {
        &self.engine
    }

    pub fn staging(&self) -> &UploadStaging {
        &self.staging
    }

    /// Extract one document.
    ///
    /// Only an unsupported format is returned as an error; every other
    /// problem is reported on the result's status.
    pub async fn extract(&self, request: ExtractionRequest) -> Result<ExtractionResult, ExtractionError> {
        let filename = request.filename.trim().to_string();
        let kind = classify(&filename);
        let extension = extract_extension(&filename);

        if !kind.is_supported() {
            warn!("Rejected '{}': unsupported extension '{}'", filename, extension);
            return Err(ExtractionError::UnsupportedFormat {
                filename,
                extension,
                supported: supported_extensions().join(", "),
            });
        }

        if let Some(detected) = infer::get(&request.bytes) {
            debug!("'{}' classified as {}, content sniffed as {}", filename, kind, detected.mime_type());
        }

        let meta = FileMeta {
            filename,
            extension,
            size_bytes: request.bytes.len() as u64,
        };

        let staged = match self.staging.stage(&meta.extension, &request.bytes) {
            Ok(staged) => staged,
            Err(e) => {
                warn!("Failed to stage '{}': {}", meta.filename, e);
                let outcome = ExtractionOutcome::failed("Upload staging", e.into());
                return Ok(assemble(outcome, &meta, request.verbose));
            }
        };

        let deadline = Instant::now() + self.timeout;
        let started = std::time::Instant::now();
        let outcome = self.run_strategy(kind, &meta, request.bytes, &staged, deadline).await;
        drop(staged);

        let result = assemble(outcome, &meta, request.verbose);
        info!(
            "Extracted '{}' via {} in {}ms: {} ({} words)",
            result.filename,
            result.extraction_method,
            started.elapsed().as_millis(),
            result.status,
            result.word_count
        );

        Ok(result)
    }

    async fn run_strategy(
        &self,
        kind: FormatKind,
        meta: &FileMeta,
        bytes: Vec<u8>,
        staged: &StagedUpload,
        deadline: Instant,
    ) -> ExtractionOutcome {
        match kind {
            k if k.is_text_layer() => {
                let extension = meta.extension.clone();
                let decoding = tokio::task::spawn_blocking(move || text_decoders::decode(k, &extension, &bytes));
                match timeout_at(deadline, decoding).await {
                    Ok(Ok(decoded)) => ExtractionOutcome::Extracted(ExtractedContent::new(decoded.text, decoded.method)),
                    Ok(Err(e)) => ExtractionOutcome::failed(
                        "Text decoding",
                        ExtractionFailure::Io(format!("decoder worker failed: {}", e)),
                    ),
                    Err(_) => ExtractionOutcome::failed("Text decoding", self.timeout_failure()),
                }
            }
            FormatKind::WordProcessing => match timeout_at(deadline, self.docx.extract_docx(staged.path())).await {
                Ok(Ok(content)) => ExtractionOutcome::Extracted(content),
                Ok(Err(failure)) => {
                    warn!("DOCX extraction failed for '{}': {}", meta.filename, failure);
                    ExtractionOutcome::failed("DOCX XML extraction", failure)
                }
                Err(_) => ExtractionOutcome::failed("DOCX XML extraction", self.timeout_failure()),
            },
            FormatKind::PageDocument => match self.pdf.extract(staged.path(), &self.engine, deadline).await {
                Ok(content) => ExtractionOutcome::Extracted(content),
                Err(failure) => {
                    warn!("PDF extraction failed for '{}': {}", meta.filename, failure);
                    ExtractionOutcome::failed("PDF extraction", failure)
                }
            },
            FormatKind::Image => match self.engine.recognize_bytes(bytes, Some(deadline)).await {
                Ok(report) => ExtractionOutcome::Extracted(image_content(report)),
                Err(e) => {
                    warn!("OCR failed for '{}': {}", meta.filename, e);
                    ExtractionOutcome::failed("Multilingual OCR", ExtractionFailure::from_ocr(e, self.timeout.as_secs()))
                }
            },
            k if k.is_capability_stub() => ExtractionOutcome::failed(
                format!("{} extraction", k.description()),
                ExtractionFailure::CapabilityUnavailable {
                    format: capitalize(k.description()),
                },
            ),
            other => unreachable!("{} is rejected before staging", other),
        }
    }

    fn timeout_failure(&self) -> ExtractionFailure {
        ExtractionFailure::Timeout {
            seconds: self.timeout.as_secs(),
        }
    }
}

fn image_content(report: OcrReport) -> ExtractedContent {
    let method = match report.canonical_attempt() {
        Some(best) => format!(
            "Multilingual OCR ({} methods, best: {})",
            report.attempts.len(),
            best.method
        ),
        None => "Multilingual OCR (no clear text detected)".to_string(),
    };

    let mut content = ExtractedContent::new(report.text(), method);
    if report.is_truncated() {
        content.add_note(format!(
            "OCR truncated by the time limit: {} of {} passes completed",
            report.completed_count(),
            report.attempts.len()
        ));
    }
    content.with_ocr_report(None, report)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
