//! The fixed, ordered set of recognition passes run against every image.

use std::fmt;

/// Tesseract page segmentation modes used by the passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentationMode {
    /// Assume a single column of text of variable sizes
    SingleColumn,
    /// Assume a single uniform block of text
    UniformBlock,
    /// Treat the image as a single text line
    SingleLine,
    /// Find as much text as possible in no particular order
    SparseText,
}

impl SegmentationMode {
    pub fn psm(&self) -> u8 {
        match self {
            SegmentationMode::SingleColumn => 4,
            SegmentationMode::UniformBlock => 6,
            SegmentationMode::SingleLine => 7,
            SegmentationMode::SparseText => 11,
        }
    }
}

impl fmt::Display for SegmentationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "psm {}", self.psm())
    }
}

/// Language codes used by the "major languages" pass
pub const MAJOR_LANGUAGES: &[&str] = &["eng", "ell", "fra", "deu", "spa", "ara", "chi_sim", "rus"];

/// Data files that are installed alongside language packs but are not languages
const NON_RECOGNITION_PACKS: &[&str] = &["osd", "equ"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageSet {
    /// Every installed language pack
    Installed,
    /// English plus the major languages, restricted to what is installed
    Major,
    Single(&'static str),
}

impl LanguageSet {
    /// Build the `+`-joined language argument for this set.
    ///
    /// An empty or unknown installation resolves to English so a pass
    /// always has something to run with.
    pub fn resolve(&self, installed: &[String]) -> String {
        let codes: Vec<&str> = match self {
            LanguageSet::Installed => installed
                .iter()
                .map(String::as_str)
                .filter(|code| !NON_RECOGNITION_PACKS.contains(code))
                .collect(),
            LanguageSet::Major => MAJOR_LANGUAGES
                .iter()
                .copied()
                .filter(|code| installed.iter().any(|lang| lang == code))
                .collect(),
            LanguageSet::Single(code) => vec![*code],
        };

        if codes.is_empty() {
            "eng".to_string()
        } else {
            codes.join("+")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrPass {
    pub name: &'static str,
    pub segmentation: SegmentationMode,
    pub languages: LanguageSet,
}

impl OcrPass {
    pub const fn new(name: &'static str, segmentation: SegmentationMode, languages: LanguageSet) -> Self {
        Self { name, segmentation, languages }
    }
}

/// Passes in evaluation order. Order matters: ties in quality score go to
/// the earlier pass.
pub fn default_passes() -> Vec<OcrPass> {
    vec![
        OcrPass::new("All Languages Auto", SegmentationMode::UniformBlock, LanguageSet::Installed),
        OcrPass::new("All Languages Block", SegmentationMode::SingleColumn, LanguageSet::Installed),
        OcrPass::new("English + Major", SegmentationMode::UniformBlock, LanguageSet::Major),
        OcrPass::new("English Focus", SegmentationMode::UniformBlock, LanguageSet::Single("eng")),
        OcrPass::new("Single Text Line", SegmentationMode::SingleLine, LanguageSet::Installed),
        OcrPass::new("Sparse Text", SegmentationMode::SparseText, LanguageSet::Installed),
    ]
}
