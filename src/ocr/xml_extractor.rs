//! DOCX extraction over the zip/XML container.
//!
//! The document is walked structurally: body paragraphs, top-level tables
//! and the default header/footer of every section. Text inside nested
//! tables and text boxes is not reported.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::extraction::error::{ExtractionFailure, ParseCause};
use crate::extraction::outcome::ExtractedContent;
use crate::models::DocumentStats;

/// Compound File Binary signature used by legacy Office files and by
/// password-encrypted OOXML packages
const CFB_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Tracks decompressed bytes across all entries of one archive
pub struct ExtractionContext {
    total_decompressed_size: AtomicU64,
    max_total_decompressed_size: u64,
    compressed_file_size: u64,
    max_compression_ratio: f64,
}

impl ExtractionContext {
    pub fn new(max_total_decompressed_size: u64, compressed_file_size: u64) -> Self {
        Self {
            total_decompressed_size: AtomicU64::new(0),
            max_total_decompressed_size,
            compressed_file_size,
            max_compression_ratio: 1000.0,
        }
    }

    pub fn add_decompressed_bytes(&self, bytes: u64) -> Result<(), ExtractionFailure> {
        let new_total = self.total_decompressed_size.fetch_add(bytes, Ordering::SeqCst) + bytes;

        if new_total > self.max_total_decompressed_size {
            return Err(ExtractionFailure::corrupted(format!(
                "archive expands to more than {:.1} MB",
                self.max_total_decompressed_size as f64 / (1024.0 * 1024.0)
            )));
        }

        if self.compressed_file_size > 0 {
            let ratio = new_total as f64 / self.compressed_file_size as f64;
            if ratio > self.max_compression_ratio {
                return Err(ExtractionFailure::corrupted(format!(
                    "suspicious compression ratio {:.1}:1 (limit {:.1}:1)",
                    ratio, self.max_compression_ratio
                )));
            }
        }

        Ok(())
    }
}

/// Structural content of a word-processing document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocxDocument {
    /// Every body paragraph in order, including empty ones
    pub paragraphs: Vec<String>,
    /// Top-level tables as rows of cell texts
    pub tables: Vec<Vec<Vec<String>>>,
    pub sections: Vec<SectionContent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionContent {
    pub header: Vec<String>,
    pub footer: Vec<String>,
}

impl DocxDocument {
    /// Compose the tagged plain-text rendering and its statistics.
    ///
    /// Blocks appear in a fixed order (headers and footers, body, tables)
    /// and are omitted entirely when they have nothing to show.
    pub fn compose(&self) -> (String, DocumentStats) {
        let mut header_footer = Vec::new();
        for section in &self.sections {
            for line in section.header.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
                header_footer.push(format!("[HEADER] {}", line));
            }
            for line in section.footer.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
                header_footer.push(format!("[FOOTER] {}", line));
            }
        }

        let body: Vec<&str> = self
            .paragraphs
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect();

        let rows: Vec<String> = self
            .tables
            .iter()
            .flatten()
            .filter_map(|row| {
                let cells: Vec<&str> = row.iter().map(|c| c.trim()).filter(|c| !c.is_empty()).collect();
                (!cells.is_empty()).then(|| cells.join(" | "))
            })
            .collect();

        let mut blocks = Vec::new();
        if !header_footer.is_empty() {
            blocks.push(format!("=== HEADERS & FOOTERS ===\n{}", header_footer.join("\n")));
        }
        if !body.is_empty() {
            blocks.push(format!("=== DOCUMENT CONTENT ===\n{}", body.join("\n")));
        }
        if !rows.is_empty() {
            blocks.push(format!("=== TABLES ===\n{}", rows.join("\n")));
        }

        let stats = DocumentStats {
            total_paragraphs: self.paragraphs.len(),
            total_tables: self.tables.len(),
            total_sections: self.sections.len(),
            header_footer_lines: header_footer.len(),
        };

        (blocks.join("\n\n"), stats)
    }

    pub fn non_empty_paragraphs(&self) -> usize {
        self.paragraphs.iter().filter(|p| !p.trim().is_empty()).count()
    }
}

/// Default header/footer relationship ids declared by one `w:sectPr`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SectionRefs {
    header: Option<String>,
    footer: Option<String>,
}

/// Output of one XML part walk
#[derive(Debug, Default)]
struct ParsedPart {
    paragraphs: Vec<String>,
    tables: Vec<Vec<Vec<String>>>,
    sections: Vec<SectionRefs>,
}

#[derive(Debug, Default)]
struct TableBuilder {
    rows: Vec<Vec<String>>,
    current_row: Option<Vec<String>>,
    current_cell: Option<Vec<String>>,
}

impl TableBuilder {
    fn start_row(&mut self) {
        self.current_row = Some(Vec::new());
    }

    fn end_row(&mut self) {
        if let Some(row) = self.current_row.take() {
            self.rows.push(row);
        }
    }

    fn start_cell(&mut self) {
        self.current_cell = Some(Vec::new());
    }

    fn end_cell(&mut self) {
        if let Some(paragraphs) = self.current_cell.take() {
            let text = paragraphs.join("\n");
            self.current_row.get_or_insert_with(Vec::new).push(text);
        }
    }

    fn push_paragraph(&mut self, text: String) {
        if let Some(cell) = self.current_cell.as_mut() {
            cell.push(text);
        }
    }
}

/// Walks `w:p`, `w:tbl` and `w:sectPr` elements of a document, header or footer part
#[derive(Debug, Default)]
struct PartWalker {
    part: ParsedPart,
    paragraphs: Vec<String>,
    tables: Vec<TableBuilder>,
    run_depth: usize,
    in_text: bool,
    section_depth: usize,
    section: SectionRefs,
}

impl PartWalker {
    fn start(&mut self, e: &BytesStart<'_>) {
        match e.name().as_ref() {
            b"w:p" => self.paragraphs.push(String::new()),
            b"w:r" => self.run_depth += 1,
            b"w:t" => self.in_text = true,
            b"w:tbl" => self.tables.push(TableBuilder::default()),
            b"w:tr" => {
                if let Some(table) = self.tables.last_mut() {
                    table.start_row();
                }
            }
            b"w:tc" => {
                if let Some(table) = self.tables.last_mut() {
                    table.start_cell();
                }
            }
            b"w:sectPr" => {
                if self.section_depth == 0 {
                    self.section = SectionRefs::default();
                }
                self.section_depth += 1;
            }
            _ => {}
        }
    }

    fn empty(&mut self, e: &BytesStart<'_>) {
        match e.name().as_ref() {
            b"w:p" => self.finish_paragraph(String::new()),
            b"w:tab" if self.run_depth > 0 => self.push_text("\t"),
            b"w:br" | b"w:cr" if self.run_depth > 0 => self.push_text("\n"),
            b"w:headerReference" if self.section_depth == 1 => {
                if let Some(id) = default_reference_id(e) {
                    self.section.header = Some(id);
                }
            }
            b"w:footerReference" if self.section_depth == 1 => {
                if let Some(id) = default_reference_id(e) {
                    self.section.footer = Some(id);
                }
            }
            b"w:sectPr" if self.section_depth == 0 => self.part.sections.push(SectionRefs::default()),
            _ => {}
        }
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"w:p" => {
                let text = self.paragraphs.pop().unwrap_or_default();
                self.finish_paragraph(text);
            }
            b"w:r" => self.run_depth = self.run_depth.saturating_sub(1),
            b"w:t" => self.in_text = false,
            b"w:tc" => {
                if let Some(table) = self.tables.last_mut() {
                    table.end_cell();
                }
            }
            b"w:tr" => {
                if let Some(table) = self.tables.last_mut() {
                    table.end_row();
                }
            }
            b"w:tbl" => {
                if let Some(table) = self.tables.pop() {
                    // Nested tables are dropped with their content
                    if self.tables.is_empty() && self.paragraphs.is_empty() {
                        self.part.tables.push(table.rows);
                    }
                }
            }
            b"w:sectPr" => {
                self.section_depth = self.section_depth.saturating_sub(1);
                if self.section_depth == 0 {
                    self.part.sections.push(std::mem::take(&mut self.section));
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.in_text {
            self.push_text(text);
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(paragraph) = self.paragraphs.last_mut() {
            paragraph.push_str(text);
        }
    }

    fn finish_paragraph(&mut self, text: String) {
        // Paragraphs inside another paragraph live in text boxes
        if !self.paragraphs.is_empty() {
            return;
        }
        match self.tables.last_mut() {
            Some(table) => table.push_paragraph(text),
            None => self.part.paragraphs.push(text),
        }
    }
}

fn default_reference_id(e: &BytesStart<'_>) -> Option<String> {
    let mut kind = None;
    let mut id = None;
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"w:type" => kind = Some(String::from_utf8_lossy(&attr.value).into_owned()),
            b"r:id" => id = Some(String::from_utf8_lossy(&attr.value).into_owned()),
            _ => {}
        }
    }
    match kind.as_deref() {
        None | Some("default") => id,
        _ => None,
    }
}

/// XML-based DOCX extractor with archive safety limits
#[derive(Debug, Clone, Default)]
pub struct XmlOfficeExtractor;

impl XmlOfficeExtractor {
    const MAX_DECOMPRESSED_SIZE: u64 = 100 * 1024 * 1024;
    const MAX_XML_SIZE: u64 = 10 * 1024 * 1024;
    const MAX_ZIP_ENTRIES: usize = 1000;
    const MAX_ENTRY_NAME_LENGTH: usize = 255;
    const MAX_OFFICE_SIZE: u64 = 50 * 1024 * 1024;
    const XML_READ_BUFFER_SIZE: usize = 8192;

    pub fn new() -> Self {
        Self
    }

    fn create_secure_xml_reader(xml_content: &str) -> Reader<&[u8]> {
        let mut reader = Reader::from_str(xml_content);
        let config = reader.config_mut();
        // Whitespace inside w:t is significant
        config.trim_text(false);
        config.check_end_names = false;
        config.expand_empty_elements = false;
        reader
    }

    fn validate_zip_entry_name(entry_name: &str) -> Result<(), ExtractionFailure> {
        if entry_name.len() > Self::MAX_ENTRY_NAME_LENGTH {
            return Err(ExtractionFailure::corrupted(format!(
                "archive entry name too long ({} characters)",
                entry_name.len()
            )));
        }
        if entry_name.contains("..") {
            return Err(ExtractionFailure::corrupted(format!(
                "archive entry contains a directory traversal sequence: '{}'",
                entry_name
            )));
        }
        if entry_name.starts_with('/') || entry_name.starts_with('\\') {
            return Err(ExtractionFailure::corrupted(format!(
                "archive entry has an absolute path: '{}'",
                entry_name
            )));
        }
        if entry_name.len() >= 2 && entry_name.chars().nth(1) == Some(':') {
            return Err(ExtractionFailure::corrupted(format!(
                "archive entry has a drive letter: '{}'",
                entry_name
            )));
        }
        if entry_name.chars().any(|c| ['<', '>', '|', '*', '?'].contains(&c)) {
            return Err(ExtractionFailure::corrupted(format!(
                "archive entry contains suspicious characters: '{}'",
                entry_name
            )));
        }
        Ok(())
    }

    /// Read one archive entry in chunks, enforcing the per-entry and total limits
    fn read_zip_entry_safely<R: Read>(
        reader: &mut R,
        max_size: u64,
        context: &ExtractionContext,
    ) -> Result<String, ExtractionFailure> {
        let mut buffer = Vec::new();
        let mut total_read = 0u64;
        let mut chunk = [0u8; Self::XML_READ_BUFFER_SIZE];

        loop {
            let bytes_read = reader
                .read(&mut chunk)
                .map_err(|e| ExtractionFailure::corrupted(format!("archive entry could not be read: {}", e)))?;
            if bytes_read == 0 {
                break;
            }

            total_read += bytes_read as u64;
            if total_read > max_size {
                return Err(ExtractionFailure::corrupted(format!(
                    "archive entry exceeds {:.1} MB",
                    max_size as f64 / (1024.0 * 1024.0)
                )));
            }
            context.add_decompressed_bytes(bytes_read as u64)?;
            buffer.extend_from_slice(&chunk[..bytes_read]);
        }

        Ok(match String::from_utf8(buffer) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }

    fn remove_null_bytes(text: &str) -> String {
        let cleaned: String = text.chars().filter(|&c| c != '\0').collect();
        if cleaned.len() < text.len() {
            warn!("Removed {} null bytes from extracted text", text.len() - cleaned.len());
        }
        cleaned
    }

    /// Extract the DOCX file at `path`
    pub async fn extract_docx(&self, path: &Path) -> Result<ExtractedContent, ExtractionFailure> {
        let start_time = Instant::now();
        let metadata = tokio::fs::metadata(path).await?;
        if metadata.len() > Self::MAX_OFFICE_SIZE {
            return Err(ExtractionFailure::corrupted(format!(
                "document is {:.1} MB, above the {:.1} MB limit for word-processing files",
                metadata.len() as f64 / (1024.0 * 1024.0),
                Self::MAX_OFFICE_SIZE as f64 / (1024.0 * 1024.0)
            )));
        }

        let bytes = tokio::fs::read(path).await?;
        let document = tokio::task::spawn_blocking(move || Self::parse_docx(&bytes))
            .await
            .map_err(|e| ExtractionFailure::Io(format!("DOCX worker failed: {}", e)))??;

        let (text, stats) = document.compose();
        let text = Self::remove_null_bytes(&text);
        let method = format!(
            "DOCX XML extraction ({} paragraphs, {} tables)",
            document.non_empty_paragraphs(),
            stats.total_tables
        );

        info!(
            "DOCX extraction completed: {} paragraphs, {} tables, {} sections in {}ms",
            stats.total_paragraphs,
            stats.total_tables,
            stats.total_sections,
            start_time.elapsed().as_millis()
        );

        Ok(ExtractedContent::new(text, method).with_stats(stats))
    }

    /// Parse a DOCX package held in memory
    pub fn parse_docx(bytes: &[u8]) -> Result<DocxDocument, ExtractionFailure> {
        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| classify_container_failure(bytes, &e.to_string()))?;

        let entry_count = archive.len();
        if entry_count > Self::MAX_ZIP_ENTRIES {
            return Err(ExtractionFailure::corrupted(format!(
                "archive has {} entries, more than the {} allowed",
                entry_count,
                Self::MAX_ZIP_ENTRIES
            )));
        }
        for i in 0..entry_count {
            let entry = archive
                .by_index(i)
                .map_err(|e| ExtractionFailure::corrupted(format!("damaged archive entry: {}", e)))?;
            Self::validate_zip_entry_name(entry.name())?;
        }

        let context = ExtractionContext::new(Self::MAX_DECOMPRESSED_SIZE, bytes.len() as u64);

        let document_xml = Self::read_part(&mut archive, "word/document.xml", &context)?
            .ok_or_else(|| ExtractionFailure::corrupted("missing word/document.xml"))?;
        let body = parse_part(&document_xml)?;

        let relationships = match Self::read_part(&mut archive, "word/_rels/document.xml.rels", &context)? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };

        let mut part_cache: HashMap<String, Vec<String>> = HashMap::new();
        let mut sections = Vec::with_capacity(body.sections.len());
        let mut inherited = SectionRefs::default();

        for refs in &body.sections {
            // A section without its own reference repeats the previous section's
            let header_id = refs.header.clone().or_else(|| inherited.header.clone());
            let footer_id = refs.footer.clone().or_else(|| inherited.footer.clone());

            let header = Self::resolve_part(&mut archive, &relationships, header_id.as_deref(), &context, &mut part_cache)?;
            let footer = Self::resolve_part(&mut archive, &relationships, footer_id.as_deref(), &context, &mut part_cache)?;

            sections.push(SectionContent { header, footer });
            inherited = SectionRefs {
                header: header_id,
                footer: footer_id,
            };
        }

        debug!(
            "Parsed DOCX body: {} paragraphs, {} tables, {} sections",
            body.paragraphs.len(),
            body.tables.len(),
            sections.len()
        );

        Ok(DocxDocument {
            paragraphs: body.paragraphs,
            tables: body.tables,
            sections,
        })
    }

    fn read_part<R: Read + std::io::Seek>(
        archive: &mut ZipArchive<R>,
        name: &str,
        context: &ExtractionContext,
    ) -> Result<Option<String>, ExtractionFailure> {
        let mut entry = match archive.by_name(name) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(ExtractionFailure::corrupted(format!("cannot open {}: {}", name, e))),
        };
        Self::read_zip_entry_safely(&mut entry, Self::MAX_XML_SIZE, context).map(Some)
    }

    fn resolve_part<R: Read + std::io::Seek>(
        archive: &mut ZipArchive<R>,
        relationships: &HashMap<String, String>,
        relationship_id: Option<&str>,
        context: &ExtractionContext,
        cache: &mut HashMap<String, Vec<String>>,
    ) -> Result<Vec<String>, ExtractionFailure> {
        let Some(target) = relationship_id.and_then(|id| relationships.get(id)) else {
            return Ok(Vec::new());
        };
        if let Some(paragraphs) = cache.get(target) {
            return Ok(paragraphs.clone());
        }

        let paragraphs = match Self::read_part(archive, target, context)? {
            Some(xml) => parse_part(&xml)?.paragraphs,
            None => {
                warn!("Header/footer part {} referenced but missing", target);
                Vec::new()
            }
        };
        cache.insert(target.clone(), paragraphs.clone());
        Ok(paragraphs)
    }
}

fn parse_part(xml: &str) -> Result<ParsedPart, ExtractionFailure> {
    let mut reader = XmlOfficeExtractor::create_secure_xml_reader(xml);
    let mut walker = PartWalker::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => walker.start(e),
            Ok(Event::Empty(ref e)) => walker.empty(e),
            Ok(Event::End(ref e)) => walker.end(e.name().as_ref()),
            Ok(Event::Text(ref e)) => {
                if walker.in_text {
                    let text = e
                        .unescape()
                        .map_err(|err| ExtractionFailure::corrupted(format!("invalid XML text: {}", err)))?;
                    walker.text(&text);
                }
            }
            Ok(Event::CData(ref e)) => {
                if walker.in_text {
                    walker.text(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractionFailure::corrupted(format!(
                    "XML parsing error at position {}: {}",
                    reader.error_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(walker.part)
}

/// Map relationship ids to archive paths
fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, ExtractionFailure> {
    let mut reader = XmlOfficeExtractor::create_secure_xml_reader(xml);
    let mut relationships = HashMap::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) if e.name().as_ref() == b"Relationship" => {
                let mut id = None;
                let mut target = None;
                let mut external = false;
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).into_owned();
                    match attr.key.as_ref() {
                        b"Id" => id = Some(value),
                        b"Target" => target = Some(value),
                        b"TargetMode" => external = value == "External",
                        _ => {}
                    }
                }
                if let (Some(id), Some(target), false) = (id, target, external) {
                    relationships.insert(id, resolve_target(&target));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractionFailure::corrupted(format!(
                    "invalid document relationships: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

/// Relationship targets are relative to `word/` unless absolute
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("word/{}", target),
    }
}

/// Work out why bytes that should be a DOCX package are not a readable zip
pub fn classify_container_failure(bytes: &[u8], zip_error: &str) -> ExtractionFailure {
    if bytes.starts_with(&CFB_SIGNATURE) {
        if contains_utf16le(bytes, "EncryptedPackage") {
            return ExtractionFailure::parse(
                ParseCause::PasswordProtected,
                "document is encrypted with a password",
            );
        }
        return ExtractionFailure::parse(
            ParseCause::UnsupportedVersion,
            "legacy Word 97-2003 binary document; save it as .docx",
        );
    }

    if bytes.len() < 4 {
        return ExtractionFailure::corrupted("file is empty or truncated");
    }

    if bytes.starts_with(b"PK") {
        return ExtractionFailure::corrupted(format!("damaged zip container: {}", zip_error));
    }

    match infer::get(bytes) {
        Some(kind) => ExtractionFailure::corrupted(format!(
            "not a DOCX package (content looks like {})",
            kind.mime_type()
        )),
        None => ExtractionFailure::corrupted("not a DOCX package"),
    }
}

fn contains_utf16le(haystack: &[u8], needle: &str) -> bool {
    let encoded: Vec<u8> = needle.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect();
    haystack.windows(encoded.len()).any(|window| window == encoded.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(inner: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>{}</w:body></w:document>"#,
            inner
        )
    }

    #[test]
    fn test_paragraph_runs_are_concatenated() {
        let xml = body(r#"<w:p><w:r><w:t>Hello </w:t></w:r><w:r><w:t xml:space="preserve">world</w:t></w:r></w:p><w:p/>"#);
        let part = parse_part(&xml).unwrap();
        assert_eq!(part.paragraphs, vec!["Hello world".to_string(), String::new()]);
    }

    #[test]
    fn test_tab_stops_in_properties_are_not_text() {
        let xml = body(
            r#"<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>A</w:t><w:tab/><w:t>B</w:t></w:r></w:p>"#,
        );
        let part = parse_part(&xml).unwrap();
        assert_eq!(part.paragraphs, vec!["A\tB".to_string()]);
    }

    #[test]
    fn test_tables_collect_cells_and_skip_nested() {
        let xml = body(
            r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>Name</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Age</w:t></w:r></w:p></w:tc></w:tr>
<w:tr><w:tc><w:p><w:r><w:t>Ada</w:t></w:r></w:p><w:tbl><w:tr><w:tc><w:p><w:r><w:t>hidden</w:t></w:r></w:p></w:tc></w:tr></w:tbl></w:tc><w:tc><w:p><w:r><w:t>36</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
<w:p><w:r><w:t>After</w:t></w:r></w:p>"#,
        );
        let part = parse_part(&xml).unwrap();
        assert_eq!(part.tables.len(), 1);
        assert_eq!(
            part.tables[0],
            vec![vec!["Name".to_string(), "Age".to_string()], vec!["Ada".to_string(), "36".to_string()]]
        );
        assert_eq!(part.paragraphs, vec!["After".to_string()]);
    }

    #[test]
    fn test_textbox_paragraphs_are_skipped() {
        let xml = body(
            r#"<w:p><w:r><w:t>Outer</w:t></w:r><w:r><w:pict><w:txbxContent><w:p><w:r><w:t>Inner</w:t></w:r></w:p></w:txbxContent></w:pict></w:r></w:p>"#,
        );
        let part = parse_part(&xml).unwrap();
        assert_eq!(part.paragraphs, vec!["Outer".to_string()]);
    }

    #[test]
    fn test_section_references() {
        let xml = body(
            r#"<w:p><w:pPr><w:sectPr><w:headerReference w:type="default" r:id="rId7"/><w:headerReference w:type="first" r:id="rId8"/></w:sectPr></w:pPr></w:p>
<w:sectPr><w:footerReference w:type="default" r:id="rId9"/></w:sectPr>"#,
        );
        let part = parse_part(&xml).unwrap();
        assert_eq!(part.sections.len(), 2);
        assert_eq!(part.sections[0].header.as_deref(), Some("rId7"));
        assert_eq!(part.sections[0].footer, None);
        assert_eq!(part.sections[1].footer.as_deref(), Some("rId9"));
    }

    #[test]
    fn test_compose_blocks_in_order() {
        let document = DocxDocument {
            paragraphs: vec!["Intro".into(), "  ".into(), "Body".into()],
            tables: vec![vec![vec!["a".into(), "".into(), "b".into()], vec!["".into()]]],
            sections: vec![SectionContent {
                header: vec!["Top".into()],
                footer: vec!["Page".into()],
            }],
        };
        let (text, stats) = document.compose();
        assert_eq!(
            text,
            "=== HEADERS & FOOTERS ===\n[HEADER] Top\n[FOOTER] Page\n\n=== DOCUMENT CONTENT ===\nIntro\nBody\n\n=== TABLES ===\na | b"
        );
        assert_eq!(stats.total_paragraphs, 3);
        assert_eq!(stats.total_tables, 1);
        assert_eq!(stats.total_sections, 1);
        assert_eq!(stats.header_footer_lines, 2);
        assert_eq!(document.non_empty_paragraphs(), 2);
    }

    #[test]
    fn test_compose_empty_document() {
        let (text, stats) = DocxDocument::default().compose();
        assert!(text.is_empty());
        assert_eq!(stats, DocumentStats::default());
    }

    #[test]
    fn test_relationship_targets() {
        let xml = r#"<?xml version="1.0"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/header" Target="header1.xml"/>
<Relationship Id="rId9" Type="x" Target="/word/footer1.xml"/>
<Relationship Id="rId10" Type="x" Target="https://example.com" TargetMode="External"/></Relationships>"#;
        let rels = parse_relationships(xml).unwrap();
        assert_eq!(rels.get("rId7").map(String::as_str), Some("word/header1.xml"));
        assert_eq!(rels.get("rId9").map(String::as_str), Some("word/footer1.xml"));
        assert!(!rels.contains_key("rId10"));
    }

    #[test]
    fn test_container_failure_classification() {
        let mut encrypted = CFB_SIGNATURE.to_vec();
        encrypted.extend("EncryptedPackage".encode_utf16().flat_map(|u| u.to_le_bytes()));
        assert!(matches!(
            classify_container_failure(&encrypted, "invalid"),
            ExtractionFailure::ParseFailure {
                cause: ParseCause::PasswordProtected,
                ..
            }
        ));

        let legacy = CFB_SIGNATURE.to_vec();
        assert!(matches!(
            classify_container_failure(&legacy, "invalid"),
            ExtractionFailure::ParseFailure {
                cause: ParseCause::UnsupportedVersion,
                ..
            }
        ));

        assert!(matches!(
            classify_container_failure(b"plain text, not a zip", "invalid"),
            ExtractionFailure::ParseFailure {
                cause: ParseCause::Corrupted,
                ..
            }
        ));
    }

    #[test]
    fn test_validate_zip_entry_names() {
        assert!(XmlOfficeExtractor::validate_zip_entry_name("word/document.xml").is_ok());
        assert!(XmlOfficeExtractor::validate_zip_entry_name("../evil.xml").is_err());
        assert!(XmlOfficeExtractor::validate_zip_entry_name("/etc/passwd").is_err());
        assert!(XmlOfficeExtractor::validate_zip_entry_name("C:evil").is_err());
        assert!(XmlOfficeExtractor::validate_zip_entry_name(&"a".repeat(300)).is_err());
    }

    #[test]
    fn test_decompression_limit() {
        let context = ExtractionContext::new(100, 0);
        assert!(context.add_decompressed_bytes(60).is_ok());
        assert!(context.add_decompressed_bytes(60).is_err());

        let ratio = ExtractionContext::new(u64::MAX, 1);
        assert!(ratio.add_decompressed_bytes(2000).is_err());
    }
}
