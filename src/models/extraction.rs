use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed classification of a document's extraction strategy, derived from
/// the filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    PlainText,
    MarkupText,
    DelimitedTable,
    StructuredData,
    Markdown,
    RichTextLegacy,
    WordProcessing,
    LegacyWordProcessing,
    Spreadsheet,
    Presentation,
    PageDocument,
    Image,
    Unsupported,
}

impl FormatKind {
    pub fn is_supported(&self) -> bool {
        !matches!(self, FormatKind::Unsupported)
    }

    /// Formats read directly from their bytes without a container parser
    pub fn is_text_layer(&self) -> bool {
        matches!(
            self,
            FormatKind::PlainText
                | FormatKind::MarkupText
                | FormatKind::DelimitedTable
                | FormatKind::StructuredData
                | FormatKind::Markdown
                | FormatKind::RichTextLegacy
        )
    }

    /// Formats this deployment recognises but has no extractor for
    pub fn is_capability_stub(&self) -> bool {
        matches!(
            self,
            FormatKind::LegacyWordProcessing | FormatKind::Spreadsheet | FormatKind::Presentation
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            FormatKind::PlainText => "plain text",
            FormatKind::MarkupText => "markup",
            FormatKind::DelimitedTable => "delimited table",
            FormatKind::StructuredData => "structured data",
            FormatKind::Markdown => "markdown",
            FormatKind::RichTextLegacy => "rich text",
            FormatKind::WordProcessing => "word-processing document",
            FormatKind::LegacyWordProcessing => "legacy word-processing document",
            FormatKind::Spreadsheet => "spreadsheet",
            FormatKind::Presentation => "presentation",
            FormatKind::PageDocument => "page document",
            FormatKind::Image => "image",
            FormatKind::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// How the caller wants the result rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Structured,
    Tabular,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "json" | "structured" => Ok(OutputFormat::Structured),
            "csv" | "tabular" => Ok(OutputFormat::Tabular),
            other => Err(format!(
                "Unknown output format '{}': expected structured (json) or tabular (csv)",
                other
            )),
        }
    }
}

/// Immutable input of a single extraction call
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub output_format: OutputFormat,
    /// Keep the per-pass OCR diagnostics in the result
    pub verbose: bool,
}

impl ExtractionRequest {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            filename: filename.into(),
            output_format: OutputFormat::Structured,
            verbose: false,
        }
    }

    pub fn with_output_format(mut self, output_format: OutputFormat) -> Self {
        self.output_format = output_format;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Success,
    NoContent,
    Error,
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionStatus::Success => write!(f, "success"),
            ExtractionStatus::NoContent => write!(f, "no_content"),
            ExtractionStatus::Error => write!(f, "error"),
        }
    }
}

/// Structure counts of a parsed word-processing document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub total_paragraphs: usize,
    pub total_tables: usize,
    pub total_sections: usize,
    pub header_footer_lines: usize,
}

/// Diagnostic view of one OCR configuration's result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrAttemptSummary {
    pub method: String,
    pub confidence: f32,
    pub token_count: usize,
    pub script: String,
    pub preview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// OCR outcome for one image (or one rasterised page)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_method: Option<String>,
    pub confidence: f32,
    pub detected_scripts: Vec<String>,
    pub truncated: bool,
    /// Best to worst by confidence; empty unless verbose output was requested
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<OcrAttemptSummary>,
}

/// The unified output of every extraction path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub filename: String,
    pub file_extension: String,
    pub file_size_bytes: u64,
    pub extraction_method: String,
    pub full_text: String,
    pub word_count: usize,
    pub character_count: usize,
    pub total_pages: usize,
    pub status: ExtractionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_stats: Option<DocumentStats>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ocr: Vec<OcrSummary>,
}

impl ExtractionResult {
    pub fn is_success(&self) -> bool {
        self.status == ExtractionStatus::Success
    }
}
