use crate::extraction::error::ExtractionFailure;
use crate::models::DocumentStats;
use crate::ocr::engine::OcrReport;

/// Text produced by one extraction strategy, before result assembly
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub text: String,
    pub method: String,
    pub page_count: usize,
    pub note: Option<String>,
    pub stats: Option<DocumentStats>,
    /// OCR reports, tagged with the 1-based page they came from when the
    /// source had pages
    pub ocr_reports: Vec<(Option<usize>, OcrReport)>,
}

impl ExtractedContent {
    pub fn new(text: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            method: method.into(),
            page_count: 1,
            note: None,
            stats: None,
            ocr_reports: Vec::new(),
        }
    }

    pub fn with_pages(mut self, page_count: usize) -> Self {
        self.page_count = page_count;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Append to an existing note rather than replacing it
    pub fn add_note(&mut self, note: impl Into<String>) {
        let note = note.into();
        self.note = Some(match self.note.take() {
            Some(existing) => format!("{}; {}", existing, note),
            None => note,
        });
    }

    pub fn with_stats(mut self, stats: DocumentStats) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_ocr_report(mut self, page: Option<usize>, report: OcrReport) -> Self {
        self.ocr_reports.push((page, report));
        self
    }
}

#[derive(Debug, Clone)]
pub enum ExtractionOutcome {
    Extracted(ExtractedContent),
    Failed {
        method: String,
        failure: ExtractionFailure,
        page_count: usize,
    },
}

impl ExtractionOutcome {
    pub fn failed(method: impl Into<String>, failure: ExtractionFailure) -> Self {
        ExtractionOutcome::Failed {
            method: method.into(),
            failure,
            page_count: 1,
        }
    }
}
