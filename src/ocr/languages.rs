use async_trait::async_trait;
use tokio::process::Command;
use tracing::warn;

use crate::ocr::error::OcrError;

/// Languages assumed when the engine cannot be asked what is installed
pub const FALLBACK_LANGUAGES: &[&str] = &[
    "eng", "ell", "fra", "deu", "spa", "ara", "chi_sim", "chi_tra", "jpn", "kor", "rus", "hin", "tha",
    "vie",
];

#[async_trait]
pub trait LanguageCatalog: Send + Sync {
    /// Installed language codes, sorted
    async fn available_languages(&self) -> Result<Vec<String>, OcrError>;
}

/// Asks the installed `tesseract` binary via `--list-langs`
#[derive(Debug, Clone)]
pub struct TesseractLanguageCatalog {
    binary: String,
    tessdata_prefix: Option<String>,
}

impl TesseractLanguageCatalog {
    pub fn new(tessdata_prefix: Option<String>) -> Self {
        Self {
            binary: "tesseract".to_string(),
            tessdata_prefix,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

#[async_trait]
impl LanguageCatalog for TesseractLanguageCatalog {
    async fn available_languages(&self) -> Result<Vec<String>, OcrError> {
        let mut command = Command::new(&self.binary);
        command.arg("--list-langs");
        if let Some(prefix) = &self.tessdata_prefix {
            command.env("TESSDATA_PREFIX", prefix);
        }

        let output = command.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OcrError::TesseractNotInstalled {
                    details: format!("'{}' executable not found", self.binary),
                }
            } else {
                OcrError::InitializationFailed {
                    details: e.to_string(),
                }
            }
        })?;

        if !output.status.success() {
            return Err(OcrError::InitializationFailed {
                details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // Older releases print the list on stderr
        let listing = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };

        Ok(parse_language_listing(&listing))
    }
}

/// A fixed list of languages, used when no engine can be queried
#[derive(Debug, Clone)]
pub struct StaticLanguageCatalog {
    languages: Vec<String>,
}

impl StaticLanguageCatalog {
    pub fn new(languages: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut languages: Vec<String> = languages.into_iter().map(Into::into).collect();
        languages.sort();
        languages.dedup();
        Self { languages }
    }
}

impl Default for StaticLanguageCatalog {
    fn default() -> Self {
        Self::new(FALLBACK_LANGUAGES.iter().copied())
    }
}

#[async_trait]
impl LanguageCatalog for StaticLanguageCatalog {
    async fn available_languages(&self) -> Result<Vec<String>, OcrError> {
        Ok(self.languages.clone())
    }
}

/// Parse `tesseract --list-langs` output: a heading line followed by one
/// code per line.
pub fn parse_language_listing(listing: &str) -> Vec<String> {
    let mut languages: Vec<String> = listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of available languages"))
        .filter(|line| !line.contains(char::is_whitespace))
        .map(str::to_string)
        .collect();

    languages.sort();
    languages.dedup();
    languages
}

/// Installed languages, or the fallback list when the catalog cannot answer
pub async fn languages_or_fallback(catalog: &dyn LanguageCatalog) -> Vec<String> {
    match catalog.available_languages().await {
        Ok(languages) if !languages.is_empty() => languages,
        Ok(_) => {
            warn!("OCR engine reported no installed languages, using fallback list");
            StaticLanguageCatalog::default().languages
        }
        Err(e) => {
            warn!("Could not list OCR languages ({}), using fallback list", e);
            StaticLanguageCatalog::default().languages
        }
    }
}
