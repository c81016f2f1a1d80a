/*!
 * Test Helpers and Utilities
 *
 * Builders for configurations, services and fixture documents so tests
 * can exercise the extraction pipeline without a real OCR engine.
 */

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use image::GrayImage;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::{
    config::Config,
    extraction::service::ExtractionService,
    ocr::{
        backend::{OcrBackend, OcrToken, PassRequest},
        engine::MultiPassOcrEngine,
        error::OcrError,
        languages::{LanguageCatalog, StaticLanguageCatalog},
    },
    storage::UploadStaging,
    AppState,
};

type Script = dyn Fn(&PassRequest<'_>) -> Result<Vec<OcrToken>, OcrError> + Send + Sync;

/// OCR backend whose output is decided by a closure per pass
pub struct ScriptedBackend {
    script: Box<Script>,
}

impl ScriptedBackend {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&PassRequest<'_>) -> Result<Vec<OcrToken>, OcrError> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
        }
    }

    /// Every pass returns the same tokens
    pub fn constant(tokens: Vec<OcrToken>) -> Self {
        Self::new(move |_| Ok(tokens.clone()))
    }

    /// Every pass finds nothing
    pub fn blank() -> Self {
        Self::new(|_| Ok(Vec::new()))
    }

    /// Every pass reports the engine as missing
    pub fn unavailable() -> Self {
        Self::new(|_| {
            Err(OcrError::TesseractNotInstalled {
                details: "not installed in test".to_string(),
            })
        })
    }
}

impl OcrBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn recognize(&self, _image: &GrayImage, request: &PassRequest<'_>) -> Result<Vec<OcrToken>, OcrError> {
        (self.script)(request)
    }
}

/// Tokens from `(text, confidence)` pairs
pub fn tokens(words: &[(&str, f32)]) -> Vec<OcrToken> {
    words.iter().map(|(text, conf)| OcrToken::new(*text, *conf)).collect()
}

pub fn test_language_catalog() -> Arc<dyn LanguageCatalog> {
    Arc::new(StaticLanguageCatalog::new(["deu", "eng", "fra", "osd"]))
}

/// Creates a test configuration with sensible defaults rooted at `upload_dir`
pub fn create_test_config(upload_dir: &Path) -> Config {
    Config {
        server_address: "127.0.0.1:0".to_string(),
        upload_path: upload_dir.to_path_buf(),
        max_file_size_mb: 10,
        extraction_timeout_seconds: 30,
        ..Config::default()
    }
}

pub fn create_test_engine(backend: impl OcrBackend + 'static) -> MultiPassOcrEngine {
    MultiPassOcrEngine::new(Arc::new(backend), test_language_catalog(), 2)
}

pub fn create_test_service(upload_dir: &Path, backend: impl OcrBackend + 'static) -> ExtractionService {
    create_test_service_with_timeout(upload_dir, backend, Duration::from_secs(30))
}

pub fn create_test_service_with_timeout(
    upload_dir: &Path,
    backend: impl OcrBackend + 'static,
    timeout: Duration,
) -> ExtractionService {
    ExtractionService::new(
        UploadStaging::new(upload_dir),
        Arc::new(create_test_engine(backend)),
        timeout,
    )
}

pub fn create_test_app_state(upload_dir: &Path, backend: impl OcrBackend + 'static) -> Arc<AppState> {
    let config = create_test_config(upload_dir);
    let service = create_test_service(upload_dir, backend);
    Arc::new(AppState::new(config, service))
}

/// A PNG with some dark strokes on white, enough to pass image decoding
pub fn sample_png() -> Vec<u8> {
    let img = GrayImage::from_fn(64, 32, |x, y| {
        if (8..56).contains(&x) && (y == 10 || y == 20) {
            image::Luma([0])
        } else {
            image::Luma([255])
        }
    });
    let mut bytes = Vec::new();
    image::DynamicImage::ImageLuma8(img)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode test PNG");
    bytes
}

const W_NAMESPACES: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#;

/// Builds minimal DOCX packages for tests
#[derive(Debug, Default, Clone)]
pub struct DocxBuilder {
    body: String,
    parts: Vec<(String, &'static str, String)>,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paragraph(mut self, text: &str) -> Self {
        self.body.push_str(&paragraph_xml(text));
        self
    }

    pub fn empty_paragraph(mut self) -> Self {
        self.body.push_str("<w:p/>");
        self
    }

    pub fn table(mut self, rows: &[&[&str]]) -> Self {
        self.body.push_str("<w:tbl>");
        for row in rows {
            self.body.push_str("<w:tr>");
            for cell in row.iter() {
                self.body.push_str(&format!("<w:tc>{}</w:tc>", paragraph_xml(cell)));
            }
            self.body.push_str("</w:tr>");
        }
        self.body.push_str("</w:tbl>");
        self
    }

    /// Default header for the document's final section
    pub fn header(mut self, text: &str) -> Self {
        let xml = format!(r#"<w:hdr {}>{}</w:hdr>"#, W_NAMESPACES, paragraph_xml(text));
        self.parts.push(("header1.xml".to_string(), "header", xml));
        self
    }

    /// Default footer for the document's final section
    pub fn footer(mut self, text: &str) -> Self {
        let xml = format!(r#"<w:ftr {}>{}</w:ftr>"#, W_NAMESPACES, paragraph_xml(text));
        self.parts.push(("footer1.xml".to_string(), "footer", xml));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut section = String::from("<w:sectPr>");
        let mut rels = String::new();
        for (index, (file, kind, _)) in self.parts.iter().enumerate() {
            let id = format!("rId{}", index + 10);
            section.push_str(&format!(r#"<w:{}Reference w:type="default" r:id="{}"/>"#, kind, id));
            rels.push_str(&format!(
                r#"<Relationship Id="{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/{}" Target="{}"/>"#,
                id, kind, file
            ));
        }
        section.push_str("</w:sectPr>");

        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document {}><w:body>{}{}</w:body></w:document>"#,
            W_NAMESPACES, self.body, section
        );

        let mut buffer = Vec::new();
        {
            let mut zip = ZipWriter::new(std::io::Cursor::new(&mut buffer));
            let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

            zip.start_file("[Content_Types].xml", options).expect("zip entry");
            zip.write_all(br#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
    <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>"#)
                .expect("zip write");

            zip.start_file("_rels/.rels", options).expect("zip entry");
            zip.write_all(br#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#)
                .expect("zip write");

            zip.start_file("word/document.xml", options).expect("zip entry");
            zip.write_all(document.as_bytes()).expect("zip write");

            zip.start_file("word/_rels/document.xml.rels", options).expect("zip entry");
            zip.write_all(
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
                    rels
                )
                .as_bytes(),
            )
            .expect("zip write");

            for (file, _, xml) in &self.parts {
                zip.start_file(format!("word/{}", file), options).expect("zip entry");
                zip.write_all(xml.as_bytes()).expect("zip write");
            }

            zip.finish().expect("zip finish");
        }
        buffer
    }
}

fn paragraph_xml(text: &str) -> String {
    let escaped = text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;");
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, escaped)
}
