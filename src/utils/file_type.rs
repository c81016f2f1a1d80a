/*!
 * Format classification
 *
 * Maps a declared filename to the extraction strategy that handles it.
 * Pure lookups against a read-only extension table; no I/O.
 */

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::models::FormatKind;

static EXTENSION_TABLE: Lazy<HashMap<&'static str, FormatKind>> = Lazy::new(|| {
    use FormatKind::*;

    let entries: &[(&str, FormatKind)] = &[
        ("txt", PlainText),
        ("md", Markdown),
        ("markdown", Markdown),
        ("html", MarkupText),
        ("htm", MarkupText),
        ("xml", MarkupText),
        ("csv", DelimitedTable),
        ("json", StructuredData),
        ("rtf", RichTextLegacy),
        ("docx", WordProcessing),
        ("doc", LegacyWordProcessing),
        ("odt", LegacyWordProcessing),
        ("epub", LegacyWordProcessing),
        ("xlsx", Spreadsheet),
        ("xls", Spreadsheet),
        ("ods", Spreadsheet),
        ("pptx", Presentation),
        ("ppt", Presentation),
        ("odp", Presentation),
        ("pdf", PageDocument),
        ("png", Image),
        ("jpg", Image),
        ("jpeg", Image),
        ("gif", Image),
        ("bmp", Image),
        ("tiff", Image),
        ("tif", Image),
        ("webp", Image),
    ];

    entries.iter().copied().collect()
});

/// Classify a filename by its extension (case-insensitive)
pub fn classify(filename: &str) -> FormatKind {
    let extension = extract_extension(filename);
    EXTENSION_TABLE
        .get(extension.as_str())
        .copied()
        .unwrap_or(FormatKind::Unsupported)
}

/// Every extension the classifier recognises, sorted
pub fn supported_extensions() -> Vec<&'static str> {
    let mut extensions: Vec<&'static str> = EXTENSION_TABLE.keys().copied().collect();
    extensions.sort_unstable();
    extensions
}

/// Determine if a file goes through the OCR pipeline (images and possibly scanned PDFs)
pub fn file_needs_ocr(filename: &str) -> bool {
    matches!(classify(filename), FormatKind::Image | FormatKind::PageDocument)
}

/// Determine if a file should use text extraction (text layers and office containers)
pub fn file_needs_text_extraction(filename: &str) -> bool {
    let kind = classify(filename);
    kind.is_supported() && !file_needs_ocr(filename)
}

/// Extract file extension from filename (lowercased, without the dot)
pub fn extract_extension(filename: &str) -> String {
    match filename.rfind('.') {
        Some(pos) => filename[pos + 1..].to_lowercase(),
        None => String::new(),
    }
}
