//! Output renderings of an extraction result.

use std::fmt::Write as _;
use std::path::Path;

use crate::models::{ExtractionResult, ExtractionStatus};

pub const TABULAR_HEADER: [&str; 6] = ["Filename", "Extension", "Text", "Word_Count", "Char_Count", "Method"];

/// The result as a JSON object
pub fn render_structured(result: &ExtractionResult) -> serde_json::Result<serde_json::Value> {
    serde_json::to_value(result)
}

/// One header row plus one data row. Newlines in the text become spaces so
/// the row stays on one line.
pub fn render_tabular(result: &ExtractionResult) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(TABULAR_HEADER)?;

    let text = result.full_text.replace("\r\n", " ").replace(['\n', '\r'], " ");
    let word_count = result.word_count.to_string();
    let character_count = result.character_count.to_string();
    writer.write_record([
        result.filename.as_str(),
        result.file_extension.as_str(),
        text.as_str(),
        word_count.as_str(),
        character_count.as_str(),
        result.extraction_method.as_str(),
    ])?;

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| csv::Error::from(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// `<stem>_extracted.csv` for a tabular download
pub fn tabular_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document");
    format!("{}_extracted.csv", stem)
}

/// Human-readable report, used by the command line
pub fn render_summary(result: &ExtractionResult) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "File:       {} ({} bytes)", result.filename, result.file_size_bytes);
    let _ = writeln!(out, "Method:     {}", result.extraction_method);
    let _ = writeln!(out, "Status:     {}", result.status);
    let _ = writeln!(
        out,
        "Counts:     {} words, {} characters, {} page(s)",
        result.word_count, result.character_count, result.total_pages
    );
    if let Some(note) = &result.note {
        let _ = writeln!(out, "Note:       {}", note);
    }
    if let Some(error) = &result.error {
        let _ = writeln!(out, "Error:      {}", error);
    }
    if let Some(stats) = &result.document_stats {
        let _ = writeln!(
            out,
            "Structure:  {} paragraphs, {} tables, {} sections, {} header/footer lines",
            stats.total_paragraphs, stats.total_tables, stats.total_sections, stats.header_footer_lines
        );
    }

    for summary in &result.ocr {
        let page = summary.page.map(|p| format!(" (page {})", p)).unwrap_or_default();
        let scripts = if summary.detected_scripts.is_empty() {
            "none".to_string()
        } else {
            summary.detected_scripts.join(", ")
        };
        let _ = writeln!(
            out,
            "OCR{}:   {} at {:.1}% confidence, scripts: {}{}",
            page,
            summary.canonical_method.as_deref().unwrap_or("no text detected"),
            summary.confidence,
            scripts,
            if summary.truncated { " [truncated]" } else { "" }
        );
        for attempt in &summary.attempts {
            let _ = writeln!(
                out,
                "  - {:<22} {:>5.1}%  {:>4} tokens  {}",
                attempt.method,
                attempt.confidence,
                attempt.token_count,
                attempt.failure.as_deref().unwrap_or(&attempt.script)
            );
            if !attempt.preview.is_empty() {
                let _ = writeln!(out, "      {}", attempt.preview);
            }
        }
    }

    if result.status == ExtractionStatus::Success {
        let _ = writeln!(out);
        out.push_str(&result.full_text);
        if !result.full_text.ends_with('\n') {
            out.push('\n');
        }
    }

    out
}
