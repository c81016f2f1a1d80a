use crate::extraction::outcome::ExtractionOutcome;
use crate::models::{ExtractionResult, ExtractionStatus, OcrAttemptSummary, OcrSummary};
use crate::ocr::engine::OcrReport;

/// Facts about the uploaded file that do not depend on extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub filename: String,
    pub extension: String,
    pub size_bytes: u64,
}

/// Build the final result. Counts always come from the final text.
pub fn assemble(outcome: ExtractionOutcome, meta: &FileMeta, verbose: bool) -> ExtractionResult {
    match outcome {
        ExtractionOutcome::Extracted(content) => {
            let status = if content.text.trim().is_empty() {
                ExtractionStatus::NoContent
            } else {
                ExtractionStatus::Success
            };

            let ocr = content
                .ocr_reports
                .iter()
                .map(|(page, report)| summarize_ocr(*page, report, verbose))
                .collect();

            ExtractionResult {
                filename: meta.filename.clone(),
                file_extension: meta.extension.clone(),
                file_size_bytes: meta.size_bytes,
                extraction_method: content.method,
                word_count: content.text.split_whitespace().count(),
                character_count: content.text.chars().count(),
                full_text: content.text,
                total_pages: content.page_count,
                status,
                note: content.note,
                error: None,
                document_stats: content.stats,
                ocr,
            }
        }
        ExtractionOutcome::Failed {
            method,
            failure,
            page_count,
        } => ExtractionResult {
            filename: meta.filename.clone(),
            file_extension: meta.extension.clone(),
            file_size_bytes: meta.size_bytes,
            extraction_method: method,
            full_text: String::new(),
            word_count: 0,
            character_count: 0,
            total_pages: page_count,
            status: ExtractionStatus::Error,
            note: Some(failure.note().to_string()),
            error: Some(failure.to_string()),
            document_stats: None,
            ocr: Vec::new(),
        },
    }
}

pub fn summarize_ocr(page: Option<usize>, report: &OcrReport, verbose: bool) -> OcrSummary {
    let canonical = report.canonical_attempt();

    let attempts = if verbose {
        report
            .attempts_by_confidence()
            .into_iter()
            .map(|attempt| OcrAttemptSummary {
                method: attempt.method.clone(),
                confidence: attempt.confidence,
                token_count: attempt.token_count,
                script: attempt.script_label(),
                preview: attempt.preview(),
                failure: attempt.failure_reason(),
            })
            .collect()
    } else {
        Vec::new()
    };

    OcrSummary {
        page,
        canonical_method: canonical.map(|a| a.method.clone()),
        confidence: canonical.map(|a| a.confidence).unwrap_or(0.0),
        detected_scripts: report.detected_scripts.iter().map(|s| s.name().to_string()).collect(),
        truncated: report.is_truncated(),
        attempts,
    }
}
