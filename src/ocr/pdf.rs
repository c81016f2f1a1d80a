//! PDF extraction through the poppler command line tools.
//!
//! The embedded text layer is read first with `pdftotext`. Only when no
//! page yields any text are the first pages rasterised with `pdftoppm` and
//! run through multi-pass OCR.

use futures::future::join_all;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::extraction::error::{ExtractionFailure, ParseCause};
use crate::extraction::outcome::ExtractedContent;
use crate::ocr::engine::{MultiPassOcrEngine, OcrReport};
use crate::ocr::error::OcrError;

pub const DEFAULT_OCR_PAGE_LIMIT: usize = 3;
pub const DEFAULT_RASTER_DPI: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfSettings {
    /// Pages rasterised for OCR when the text layer is empty
    pub ocr_page_limit: usize,
    pub raster_dpi: u32,
}

impl Default for PdfSettings {
    fn default() -> Self {
        Self {
            ocr_page_limit: DEFAULT_OCR_PAGE_LIMIT,
            raster_dpi: DEFAULT_RASTER_DPI,
        }
    }
}

/// Executables used for each poppler step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfTools {
    pub pdfinfo: PathBuf,
    pub pdftotext: PathBuf,
    pub pdftoppm: PathBuf,
}

impl Default for PdfTools {
    fn default() -> Self {
        Self {
            pdfinfo: PathBuf::from("pdfinfo"),
            pdftotext: PathBuf::from("pdftotext"),
            pdftoppm: PathBuf::from("pdftoppm"),
        }
    }
}

impl PdfTools {
    /// All three tools from one installation directory
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            pdfinfo: dir.join("pdfinfo"),
            pdftotext: dir.join("pdftotext"),
            pdftoppm: dir.join("pdftoppm"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfTextLayer {
    pub page_count: usize,
    /// Text of each page in order, as embedded in the file
    pub pages: Vec<String>,
}

impl PdfTextLayer {
    pub fn has_text(&self) -> bool {
        self.pages.iter().any(|p| !p.trim().is_empty())
    }

    /// Pages that carry text, numbered from 1 in document order
    pub fn text_pages(&self) -> Vec<(usize, &str)> {
        self.pages
            .iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, text)| (i + 1, text.trim_end()))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct PdfExtractor {
    settings: PdfSettings,
    tools: PdfTools,
    scratch_dir: PathBuf,
    timeout_seconds: u64,
}

impl PdfExtractor {
    pub fn new(settings: PdfSettings, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            tools: PdfTools::default(),
            scratch_dir: scratch_dir.into(),
            timeout_seconds: 0,
        }
    }

    /// Seconds reported in timeout failures
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_tools(mut self, tools: PdfTools) -> Self {
        self.tools = tools;
        self
    }

    pub fn settings(&self) -> &PdfSettings {
        &self.settings
    }

    pub fn tools(&self) -> &PdfTools {
        &self.tools
    }

    pub async fn extract(
        &self,
        path: &Path,
        engine: &MultiPassOcrEngine,
        deadline: Instant,
    ) -> Result<ExtractedContent, ExtractionFailure> {
        let layer = timeout_at(deadline, self.read_text_layer(path))
            .await
            .map_err(|_| self.timeout())??;

        if layer.has_text() {
            let pages = layer.text_pages();

            info!("PDF text layer found on {} pages", layer.page_count);
            return Ok(ExtractedContent::new(
                render_pages(&pages, false),
                format!("PDF text extraction ({} pages)", layer.page_count),
            )
            .with_pages(layer.page_count));
        }

        if layer.page_count == 0 {
            return Ok(ExtractedContent::new("", "PDF processing (no pages found)").with_pages(0));
        }

        info!("PDF has no text layer, falling back to OCR");
        self.extract_with_ocr(path, layer.page_count, engine, deadline).await
    }

    /// Read the embedded text of every page
    pub async fn read_text_layer(&self, path: &Path) -> Result<PdfTextLayer, ExtractionFailure> {
        let reported_pages = self.page_count(path).await?;

        let output = Command::new(&self.tools.pdftotext)
            .args(["-enc", "UTF-8", "-layout"])
            .arg(path)
            .arg("-")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| tool_error("pdftotext", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_pdf_error(&stderr));
        }

        let pages = split_pages(&String::from_utf8_lossy(&output.stdout));
        let page_count = reported_pages.unwrap_or(pages.len());
        debug!("pdftotext returned {} pages (pdfinfo: {:?})", pages.len(), reported_pages);

        Ok(PdfTextLayer { page_count, pages })
    }

    /// Page count from `pdfinfo`; `None` when pdfinfo is not installed
    async fn page_count(&self, path: &Path) -> Result<Option<usize>, ExtractionFailure> {
        let output = match Command::new(&self.tools.pdfinfo)
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("pdfinfo not found, page count will come from pdftotext");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if !output.status.success() {
            return Err(classify_pdf_error(&String::from_utf8_lossy(&output.stderr)));
        }

        Ok(parse_page_count(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn extract_with_ocr(
        &self,
        path: &Path,
        page_count: usize,
        engine: &MultiPassOcrEngine,
        deadline: Instant,
    ) -> Result<ExtractedContent, ExtractionFailure> {
        let limit = self.settings.ocr_page_limit.min(page_count);
        if limit == 0 {
            return Ok(ExtractedContent::new("", "PDF processing (no text found)").with_pages(page_count));
        }

        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        let raster_dir = tempfile::Builder::new()
            .prefix("docextract-pages-")
            .tempdir_in(&self.scratch_dir)?;

        let rendered = timeout_at(deadline, self.rasterize(path, limit, raster_dir.path()))
            .await
            .map_err(|_| self.timeout())??;

        let runs = rendered.iter().map(|(page, image_path)| async move {
            let result = match tokio::fs::read(image_path).await {
                Ok(bytes) => engine.recognize_bytes(bytes, Some(deadline)).await,
                Err(e) => Err(OcrError::InvalidImageFormat {
                    details: format!("cannot read rendered page {}: {}", page, e),
                }),
            };
            (*page, result)
        });
        let results = join_all(runs).await;

        let mut reports: Vec<(usize, OcrReport)> = Vec::new();
        let mut errors: Vec<OcrError> = Vec::new();
        for (page, result) in results {
            match result {
                Ok(report) => reports.push((page, report)),
                Err(e) => {
                    warn!("OCR failed on PDF page {}: {}", page, e);
                    errors.push(e);
                }
            }
        }

        if reports.is_empty() {
            let error = errors
                .iter()
                .find(|e| e.is_engine_unavailable())
                .or_else(|| errors.first())
                .cloned()
                .unwrap_or(OcrError::DeadlineExceeded);
            return Err(ExtractionFailure::from_ocr(error, self.timeout_seconds));
        }

        let pages: Vec<(usize, &str)> = reports
            .iter()
            .filter(|(_, report)| report.has_content())
            .map(|(page, report)| (*page, report.text()))
            .collect();

        let method = if pages.is_empty() {
            "PDF processing (no text found)".to_string()
        } else {
            format!("PDF OCR extraction ({} pages)", pages.len())
        };

        let mut content = ExtractedContent::new(render_pages(&pages, true), method).with_pages(page_count);

        if page_count > limit {
            content.add_note(format!("OCR limited to the first {} of {} pages", limit, page_count));
        }
        if !errors.is_empty() || reports.iter().any(|(_, r)| r.is_truncated()) {
            content.add_note("OCR was truncated by the time limit or page errors");
        }
        for (page, report) in reports {
            content = content.with_ocr_report(Some(page), report);
        }

        Ok(content)
    }

    /// Render the first `pages` pages to PNG files, returned in page order
    async fn rasterize(
        &self,
        path: &Path,
        pages: usize,
        out_dir: &Path,
    ) -> Result<Vec<(usize, PathBuf)>, ExtractionFailure> {
        let output = Command::new(&self.tools.pdftoppm)
            .arg("-png")
            .args(["-r", &self.settings.raster_dpi.to_string()])
            .args(["-f", "1", "-l", &pages.to_string()])
            .arg(path)
            .arg(out_dir.join("page"))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| tool_error("pdftoppm", e))?;

        if !output.status.success() {
            return Err(classify_pdf_error(&String::from_utf8_lossy(&output.stderr)));
        }

        let mut entries = tokio::fs::read_dir(out_dir).await?;
        let mut rendered = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let image_path = entry.path();
            if let Some(page) = rendered_page_number(&image_path) {
                rendered.push((page, image_path));
            }
        }
        rendered.sort_by_key(|(page, _)| *page);

        debug!("Rasterised {} PDF pages at {} dpi", rendered.len(), self.settings.raster_dpi);
        Ok(rendered)
    }

    fn timeout(&self) -> ExtractionFailure {
        ExtractionFailure::Timeout {
            seconds: self.timeout_seconds,
        }
    }
}

fn tool_error(tool: &str, error: std::io::Error) -> ExtractionFailure {
    if error.kind() == std::io::ErrorKind::NotFound {
        ExtractionFailure::EngineUnavailable {
            capability: "PDF tools (poppler-utils)".to_string(),
            detail: format!("'{}' executable not found", tool),
        }
    } else {
        error.into()
    }
}

/// `pdftotext` ends every page with a form feed
pub fn split_pages(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split('\x0c').map(str::to_string).collect();
    if pages.last().is_some_and(|last| last.trim().is_empty()) {
        pages.pop();
    }
    pages
}

pub fn parse_page_count(pdfinfo: &str) -> Option<usize> {
    pdfinfo
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|count| count.trim().parse().ok())
}

/// Map poppler's stderr to a parse failure
pub fn classify_pdf_error(stderr: &str) -> ExtractionFailure {
    let lowered = stderr.to_lowercase();
    let detail = stderr
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("PDF could not be read")
        .to_string();

    let cause = if lowered.contains("password") || lowered.contains("encrypt") {
        ParseCause::PasswordProtected
    } else if lowered.contains("unsupported") {
        ParseCause::UnsupportedVersion
    } else {
        ParseCause::Corrupted
    };

    ExtractionFailure::parse(cause, detail)
}

/// `page-1.png`, `page-01.png`, ... as written by pdftoppm
fn rendered_page_number(path: &Path) -> Option<usize> {
    if path.extension().and_then(|e| e.to_str()) != Some("png") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.rsplit('-').next()?.parse().ok()
}

/// Join pages under `--- Page N ---` headers
pub fn render_pages(pages: &[(usize, &str)], ocr: bool) -> String {
    pages
        .iter()
        .map(|(page, text)| {
            if ocr {
                format!("--- Page {} (OCR) ---\n{}", page, text)
            } else {
                format!("--- Page {} ---\n{}", page, text)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
