/*!
 * Unit Tests for Format Classification
 *
 * These tests verify that declared filenames are routed to the right
 * extraction strategy and that unknown extensions are rejected.
 */

#[cfg(test)]
mod tests {
    use docextract::models::FormatKind;
    use docextract::utils::file_type::{
        classify, extract_extension, file_needs_ocr, file_needs_text_extraction, supported_extensions,
    };

    #[test]
    fn test_text_layer_formats() {
        assert_eq!(classify("notes.txt"), FormatKind::PlainText);
        assert_eq!(classify("README.md"), FormatKind::Markdown);
        assert_eq!(classify("guide.markdown"), FormatKind::Markdown);
        assert_eq!(classify("index.HTML"), FormatKind::MarkupText);
        assert_eq!(classify("feed.xml"), FormatKind::MarkupText);
        assert_eq!(classify("data.csv"), FormatKind::DelimitedTable);
        assert_eq!(classify("config.json"), FormatKind::StructuredData);
        assert_eq!(classify("letter.rtf"), FormatKind::RichTextLegacy);
    }

    #[test]
    fn test_office_documents_dont_need_ocr() {
        assert!(!file_needs_ocr("document.docx"), "DOCX files should not need OCR");
        assert!(!file_needs_ocr("DOCUMENT.DOCX"), "DOCX files should not need OCR (case insensitive)");
        assert!(!file_needs_ocr("report.doc"), "DOC files should not need OCR");
        assert!(!file_needs_ocr("sheet.xlsx"), "XLSX files should not need OCR");
    }

    #[test]
    fn test_office_documents_need_text_extraction() {
        assert!(file_needs_text_extraction("document.docx"));
        assert!(file_needs_text_extraction("report.DOC"));
        assert!(file_needs_text_extraction("slides.pptx"));
        assert!(file_needs_text_extraction("notes.txt"));
    }

    #[test]
    fn test_image_files_need_ocr() {
        for name in [
            "scan.png",
            "photo.jpg",
            "image.JPEG",
            "document.tiff",
            "fax.tif",
            "bitmap.bmp",
            "graphic.gif",
            "modern.webp",
        ] {
            assert!(file_needs_ocr(name), "{} should need OCR", name);
            assert_eq!(classify(name), FormatKind::Image, "{} should classify as an image", name);
        }
    }

    #[test]
    fn test_pdf_goes_through_ocr_pipeline() {
        assert_eq!(classify("scan.pdf"), FormatKind::PageDocument);
        assert!(file_needs_ocr("scan.pdf"));
        assert!(!file_needs_text_extraction("scan.pdf"));
    }

    #[test]
    fn test_capability_stub_formats() {
        assert_eq!(classify("legacy.doc"), FormatKind::LegacyWordProcessing);
        assert_eq!(classify("book.epub"), FormatKind::LegacyWordProcessing);
        assert_eq!(classify("budget.xls"), FormatKind::Spreadsheet);
        assert_eq!(classify("budget.ods"), FormatKind::Spreadsheet);
        assert_eq!(classify("deck.ppt"), FormatKind::Presentation);
        assert_eq!(classify("deck.odp"), FormatKind::Presentation);
    }

    #[test]
    fn test_unknown_and_missing_extensions() {
        assert_eq!(classify("archive.zip"), FormatKind::Unsupported);
        assert_eq!(classify("program.exe"), FormatKind::Unsupported);
        assert_eq!(classify("Makefile"), FormatKind::Unsupported);
        assert_eq!(classify(""), FormatKind::Unsupported);
        assert!(!file_needs_ocr("archive.zip"));
        assert!(!file_needs_text_extraction("archive.zip"));
    }

    #[test]
    fn test_only_last_extension_counts() {
        assert_eq!(classify("report.pdf.txt"), FormatKind::PlainText);
        assert_eq!(classify("photo.png.exe"), FormatKind::Unsupported);
        assert_eq!(extract_extension("archive.tar.gz"), "gz");
        assert_eq!(extract_extension("Scan.PNG"), "png");
    }

    #[test]
    fn test_supported_extensions_are_sorted_and_complete() {
        let extensions = supported_extensions();
        let mut sorted = extensions.clone();
        sorted.sort_unstable();
        assert_eq!(extensions, sorted);

        for ext in ["txt", "docx", "pdf", "png", "xlsx", "pptx", "json"] {
            assert!(extensions.contains(&ext), "{} should be supported", ext);
        }
        assert!(!extensions.contains(&"zip"));
    }
}
