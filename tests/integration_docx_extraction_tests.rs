/*!
 * DOCX extraction tests
 *
 * Build small word-processing packages in memory and check the tagged
 * plain-text rendering, the statistics, and how broken containers are
 * reported.
 */

use std::io::Write;

use docextract::extraction::error::{ExtractionFailure, ParseCause};
use docextract::ocr::xml_extractor::XmlOfficeExtractor;
use docextract::test_helpers::DocxBuilder;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

#[tokio::test]
async fn test_docx_with_header_footer_and_table() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("report.docx");
    let bytes = DocxBuilder::new()
        .header("Quarterly Report")
        .footer("Page footer")
        .paragraph("First paragraph.")
        .empty_paragraph()
        .paragraph("Second paragraph.")
        .table(&[&["Name", "Value"], &["Alpha", "1"]])
        .build();
    std::fs::write(&path, bytes).unwrap();

    let extractor = XmlOfficeExtractor::new();
    let content = extractor.extract_docx(&path).await.expect("DOCX should extract");

    assert_eq!(
        content.text,
        "=== HEADERS & FOOTERS ===\n[HEADER] Quarterly Report\n[FOOTER] Page footer\n\n\
         === DOCUMENT CONTENT ===\nFirst paragraph.\nSecond paragraph.\n\n\
         === TABLES ===\nName | Value\nAlpha | 1"
    );
    assert_eq!(content.method, "DOCX XML extraction (2 paragraphs, 1 tables)");

    let stats = content.stats.expect("DOCX extraction reports statistics");
    assert_eq!(stats.total_tables, 1);
    assert_eq!(stats.total_sections, 1);
    assert_eq!(stats.header_footer_lines, 2);
}

#[tokio::test]
async fn test_table_paragraphs_are_not_body_text() {
    let bytes = DocxBuilder::new()
        .paragraph("Intro")
        .table(&[&["Cell text", ""]])
        .build();

    let document = XmlOfficeExtractor::parse_docx(&bytes).expect("DOCX should parse");
    assert_eq!(document.non_empty_paragraphs(), 1);

    let (text, _) = document.compose();
    assert!(text.contains("=== DOCUMENT CONTENT ===\nIntro"));
    assert!(text.ends_with("=== TABLES ===\nCell text"));
}

#[tokio::test]
async fn test_empty_docx_has_no_blocks() {
    let bytes = DocxBuilder::new().empty_paragraph().build();

    let document = XmlOfficeExtractor::parse_docx(&bytes).expect("empty DOCX still parses");
    let (text, stats) = document.compose();
    assert!(text.is_empty());
    assert_eq!(stats.total_paragraphs, 1);
    assert_eq!(stats.header_footer_lines, 0);
}

#[test]
fn test_escaped_entities_are_decoded() {
    let bytes = DocxBuilder::new().paragraph("Fish & Chips <fresh>").build();
    let document = XmlOfficeExtractor::parse_docx(&bytes).unwrap();
    assert_eq!(document.paragraphs, vec!["Fish & Chips <fresh>".to_string()]);
}

#[test]
fn test_non_zip_bytes_are_reported_as_corrupted() {
    let failure = XmlOfficeExtractor::parse_docx(b"This is just plain text, not a zip").unwrap_err();
    match failure {
        ExtractionFailure::ParseFailure { cause, .. } => assert_eq!(cause, ParseCause::Corrupted),
        other => panic!("expected a parse failure, got {:?}", other),
    }
}

#[test]
fn test_truncated_zip_is_reported_as_corrupted() {
    let mut bytes = DocxBuilder::new().paragraph("Some text").build();
    bytes.truncate(bytes.len() / 2);

    let failure = XmlOfficeExtractor::parse_docx(&bytes).unwrap_err();
    assert!(failure.to_string().contains("corrupted"), "unexpected message: {}", failure);
}

#[test]
fn test_legacy_binary_document_is_unsupported_version() {
    let mut bytes = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
    bytes.extend_from_slice(&[0u8; 512]);

    match XmlOfficeExtractor::parse_docx(&bytes).unwrap_err() {
        ExtractionFailure::ParseFailure { cause, .. } => assert_eq!(cause, ParseCause::UnsupportedVersion),
        other => panic!("expected a parse failure, got {:?}", other),
    }
}

#[test]
fn test_encrypted_package_is_password_protected() {
    let mut bytes = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
    bytes.extend_from_slice(&[0u8; 64]);
    bytes.extend("EncryptedPackage".encode_utf16().flat_map(|u| u.to_le_bytes()));
    bytes.extend_from_slice(&[0u8; 64]);

    match XmlOfficeExtractor::parse_docx(&bytes).unwrap_err() {
        ExtractionFailure::ParseFailure { cause, .. } => assert_eq!(cause, ParseCause::PasswordProtected),
        other => panic!("expected a parse failure, got {:?}", other),
    }
}

#[test]
fn test_zip_without_document_part_is_corrupted() {
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(std::io::Cursor::new(&mut buffer));
        zip.start_file("readme.txt", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"not a word document").unwrap();
        zip.finish().unwrap();
    }

    let failure = XmlOfficeExtractor::parse_docx(&buffer).unwrap_err();
    assert!(failure.to_string().contains("word/document.xml"), "unexpected message: {}", failure);
}

#[test]
fn test_sections_inherit_previous_header() {
    let ns = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#;
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document {ns}><w:body>
<w:p><w:pPr><w:sectPr><w:headerReference w:type="default" r:id="rId5"/></w:sectPr></w:pPr><w:r><w:t>Section one</w:t></w:r></w:p>
<w:p><w:r><w:t>Section two</w:t></w:r></w:p>
<w:sectPr></w:sectPr>
</w:body></w:document>"#
    );
    let rels = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId5" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/header" Target="header1.xml"/>
</Relationships>"#;
    let header = format!(r#"<w:hdr {ns}><w:p><w:r><w:t>Shared header</w:t></w:r></w:p></w:hdr>"#);

    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(std::io::Cursor::new(&mut buffer));
        let options = SimpleFileOptions::default();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(document.as_bytes()).unwrap();
        zip.start_file("word/_rels/document.xml.rels", options).unwrap();
        zip.write_all(rels.as_bytes()).unwrap();
        zip.start_file("word/header1.xml", options).unwrap();
        zip.write_all(header.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    let parsed = XmlOfficeExtractor::parse_docx(&buffer).expect("DOCX should parse");
    assert_eq!(parsed.sections.len(), 2);
    assert_eq!(parsed.sections[0].header, vec!["Shared header".to_string()]);
    assert_eq!(parsed.sections[1].header, vec!["Shared header".to_string()]);

    let (text, stats) = parsed.compose();
    assert_eq!(stats.header_footer_lines, 2);
    assert!(text.starts_with("=== HEADERS & FOOTERS ===\n[HEADER] Shared header\n[HEADER] Shared header"));
}
