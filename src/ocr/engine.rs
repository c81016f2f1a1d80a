//! Multi-pass OCR.
//!
//! Every image is preprocessed once and then recognised by each configured
//! pass. Passes run concurrently on the blocking pool, bounded by the OCR
//! worker allocation, and are scored afterwards so the choice of canonical
//! text never depends on which pass finished first.

use futures::future::join_all;
use image::{DynamicImage, GrayImage};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::ocr::backend::{OcrBackend, OcrToken, PassRequest};
use crate::ocr::error::OcrError;
use crate::ocr::languages::{languages_or_fallback, LanguageCatalog};
use crate::ocr::passes::{default_passes, OcrPass};
use crate::ocr::preprocessing::{preprocess, DEFAULT_CONTRAST_FACTOR};
use crate::ocr::script::{detect_scripts, script_label, Script};

/// Tokens at or below this confidence are discarded
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 15.0;
/// Characters kept in an attempt preview
pub const PREVIEW_CHARS: usize = 150;

/// Weights of the quality score: `confidence * confidence_weight + length * length_weight`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityWeights {
    pub confidence: f32,
    pub length: f32,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            confidence: 0.7,
            length: 0.3,
        }
    }
}

impl QualityWeights {
    pub fn score(&self, confidence: f32, text: &str) -> f32 {
        self.confidence * confidence + self.length * text.chars().count() as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub confidence_threshold: f32,
    pub contrast_factor: f32,
    pub weights: QualityWeights,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            contrast_factor: DEFAULT_CONTRAST_FACTOR,
            weights: QualityWeights::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptStatus {
    Completed,
    Failed(OcrError),
    TimedOut,
}

/// The result of one pass
#[derive(Debug, Clone, PartialEq)]
pub struct OcrAttempt {
    pub method: String,
    pub text: String,
    pub confidence: f32,
    pub token_count: usize,
    pub scripts: BTreeSet<Script>,
    pub status: AttemptStatus,
}

impl OcrAttempt {
    pub fn from_tokens(method: &str, tokens: &[OcrToken], threshold: f32) -> Self {
        let kept = filter_tokens(tokens, threshold);

        let confidence = if kept.is_empty() {
            0.0
        } else {
            kept.iter().map(|t| t.confidence).sum::<f32>() / kept.len() as f32
        };
        let text = kept.iter().map(|t| t.text.trim()).collect::<Vec<_>>().join(" ");
        let scripts = detect_scripts(&text);

        Self {
            method: method.to_string(),
            text,
            confidence,
            token_count: kept.len(),
            scripts,
            status: AttemptStatus::Completed,
        }
    }

    fn without_output(method: &str, status: AttemptStatus) -> Self {
        Self {
            method: method.to_string(),
            text: String::new(),
            confidence: 0.0,
            token_count: 0,
            scripts: BTreeSet::new(),
            status,
        }
    }

    pub fn failed(method: &str, error: OcrError) -> Self {
        Self::without_output(method, AttemptStatus::Failed(error))
    }

    pub fn timed_out(method: &str) -> Self {
        Self::without_output(method, AttemptStatus::TimedOut)
    }

    pub fn is_completed(&self) -> bool {
        self.status == AttemptStatus::Completed
    }

    pub fn script_label(&self) -> String {
        script_label(&self.scripts)
    }

    /// First 150 characters, with an ellipsis when the text is longer
    pub fn preview(&self) -> String {
        if self.text.chars().count() > PREVIEW_CHARS {
            let head: String = self.text.chars().take(PREVIEW_CHARS).collect();
            format!("{}...", head)
        } else {
            self.text.clone()
        }
    }

    pub fn failure_reason(&self) -> Option<String> {
        match &self.status {
            AttemptStatus::Completed => None,
            AttemptStatus::Failed(e) => Some(e.to_string()),
            AttemptStatus::TimedOut => Some("timed out".to_string()),
        }
    }
}

/// Keep tokens above the confidence threshold that carry more than one
/// visible character.
pub fn filter_tokens(tokens: &[OcrToken], threshold: f32) -> Vec<&OcrToken> {
    tokens
        .iter()
        .filter(|t| t.confidence > threshold && t.text.trim().chars().count() > 1)
        .collect()
}

/// Index of the attempt with the highest quality score. Only a strictly
/// greater score replaces the current best, so ties go to the earlier pass.
pub fn select_canonical(attempts: &[OcrAttempt], weights: &QualityWeights) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;

    for (index, attempt) in attempts.iter().enumerate() {
        if !attempt.is_completed() || attempt.token_count == 0 {
            continue;
        }
        let score = weights.score(attempt.confidence, &attempt.text);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((index, score)),
        }
    }

    best.map(|(index, _)| index)
}

/// Everything learned about one image
#[derive(Debug, Clone)]
pub struct OcrReport {
    /// Attempts in pass order
    pub attempts: Vec<OcrAttempt>,
    pub canonical: Option<usize>,
    pub detected_scripts: BTreeSet<Script>,
}

impl OcrReport {
    pub fn from_attempts(attempts: Vec<OcrAttempt>, weights: &QualityWeights) -> Self {
        let canonical = select_canonical(&attempts, weights);
        let detected_scripts = attempts
            .iter()
            .flat_map(|a| a.scripts.iter().copied())
            .collect();

        Self {
            attempts,
            canonical,
            detected_scripts,
        }
    }

    pub fn canonical_attempt(&self) -> Option<&OcrAttempt> {
        self.canonical.and_then(|i| self.attempts.get(i))
    }

    pub fn text(&self) -> &str {
        self.canonical_attempt().map(|a| a.text.as_str()).unwrap_or("")
    }

    pub fn has_content(&self) -> bool {
        self.canonical.is_some()
    }

    /// True when some passes were cut off by the deadline
    pub fn is_truncated(&self) -> bool {
        self.attempts.iter().any(|a| a.status == AttemptStatus::TimedOut)
    }

    pub fn completed_count(&self) -> usize {
        self.attempts.iter().filter(|a| a.is_completed()).count()
    }

    /// Attempts ordered by descending confidence; equal confidences keep pass order
    pub fn attempts_by_confidence(&self) -> Vec<&OcrAttempt> {
        let mut ordered: Vec<&OcrAttempt> = self.attempts.iter().collect();
        ordered.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        ordered
    }
}

pub struct MultiPassOcrEngine {
    backend: Arc<dyn OcrBackend>,
    catalog: Arc<dyn LanguageCatalog>,
    passes: Vec<OcrPass>,
    settings: EngineSettings,
    workers: Arc<Semaphore>,
}

impl MultiPassOcrEngine {
    pub fn new(backend: Arc<dyn OcrBackend>, catalog: Arc<dyn LanguageCatalog>, workers: usize) -> Self {
        Self {
            backend,
            catalog,
            passes: default_passes(),
            settings: EngineSettings::default(),
            workers: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub fn with_passes(mut self, passes: Vec<OcrPass>) -> Self {
        self.passes = passes;
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn passes(&self) -> &[OcrPass] {
        &self.passes
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn language_catalog(&self) -> Arc<dyn LanguageCatalog> {
        Arc::clone(&self.catalog)
    }

    /// Decode image bytes and recognise them
    pub async fn recognize_bytes(&self, bytes: Vec<u8>, deadline: Option<Instant>) -> Result<OcrReport, OcrError> {
        let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|e| OcrError::WorkerFailed {
                details: e.to_string(),
            })?
            .map_err(|e| OcrError::InvalidImageFormat {
                details: e.to_string(),
            })?;

        self.recognize(image, deadline).await
    }

    /// Run every pass against `image`.
    ///
    /// Errors only when the engine is unavailable or when the deadline
    /// passed before any pass completed. Anything else is recorded on the
    /// attempts and the report may simply have no content.
    pub async fn recognize(&self, image: DynamicImage, deadline: Option<Instant>) -> Result<OcrReport, OcrError> {
        let contrast = self.settings.contrast_factor;
        let preprocessed = tokio::task::spawn_blocking(move || preprocess(&image, contrast))
            .await
            .map_err(|e| OcrError::WorkerFailed {
                details: e.to_string(),
            })?;
        let preprocessed: Arc<GrayImage> = Arc::new(preprocessed);

        let installed = languages_or_fallback(self.catalog.as_ref()).await;

        let runs = self.passes.iter().map(|pass| {
            let languages = pass.languages.resolve(&installed);
            self.run_pass(pass, languages, Arc::clone(&preprocessed), deadline)
        });
        let attempts = join_all(runs).await;

        if !attempts.is_empty() {
            if let Some(error) = engine_unavailable(&attempts) {
                return Err(error);
            }
            let any_timed_out = attempts.iter().any(|a| a.status == AttemptStatus::TimedOut);
            let any_completed = attempts.iter().any(OcrAttempt::is_completed);
            if any_timed_out && !any_completed {
                return Err(OcrError::DeadlineExceeded);
            }
        }

        let report = OcrReport::from_attempts(attempts, &self.settings.weights);

        match report.canonical_attempt() {
            Some(best) => info!(
                "OCR selected '{}' ({:.1}% confidence, {} tokens, scripts: {})",
                best.method,
                best.confidence,
                best.token_count,
                best.script_label()
            ),
            None => info!("OCR found no text in {} passes", report.attempts.len()),
        }

        Ok(report)
    }

    async fn run_pass(
        &self,
        pass: &OcrPass,
        languages: String,
        image: Arc<GrayImage>,
        deadline: Option<Instant>,
    ) -> OcrAttempt {
        let backend = Arc::clone(&self.backend);
        let workers = Arc::clone(&self.workers);
        let segmentation = pass.segmentation;
        let threshold = self.settings.confidence_threshold;

        let work = async move {
            let permit = workers.acquire_owned().await.map_err(|e| OcrError::WorkerFailed {
                details: e.to_string(),
            })?;

            tokio::task::spawn_blocking(move || {
                // The permit stays held until the blocking call returns, even
                // if the awaiting future is dropped on timeout
                let _permit = permit;
                backend.recognize(&image, &PassRequest {
                    languages: &languages,
                    segmentation,
                })
            })
            .await
            .map_err(|e| OcrError::WorkerFailed {
                details: e.to_string(),
            })?
        };

        let outcome = match deadline {
            Some(deadline) => timeout_at(deadline, work).await.ok(),
            None => Some(work.await),
        };

        match outcome {
            Some(Ok(tokens)) => {
                let attempt = OcrAttempt::from_tokens(pass.name, &tokens, threshold);
                debug!(
                    "OCR pass '{}' kept {} of {} tokens ({:.1}% confidence)",
                    pass.name,
                    attempt.token_count,
                    tokens.len(),
                    attempt.confidence
                );
                attempt
            }
            Some(Err(e)) => {
                warn!("OCR pass '{}' failed: {}", pass.name, e);
                OcrAttempt::failed(pass.name, e)
            }
            None => {
                warn!("OCR pass '{}' did not finish before the deadline", pass.name);
                OcrAttempt::timed_out(pass.name)
            }
        }
    }
}

/// The engine counts as unavailable when every pass failed because of it
fn engine_unavailable(attempts: &[OcrAttempt]) -> Option<OcrError> {
    let mut first = None;
    for attempt in attempts {
        match &attempt.status {
            AttemptStatus::Failed(e) if e.is_engine_unavailable() => {
                first.get_or_insert_with(|| e.clone());
            }
            _ => return None,
        }
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(method: &str, text: &str, confidence: f32) -> OcrAttempt {
        OcrAttempt {
            method: method.to_string(),
            text: text.to_string(),
            confidence,
            token_count: text.split_whitespace().count(),
            scripts: detect_scripts(text),
            status: AttemptStatus::Completed,
        }
    }

    #[test]
    fn test_filter_tokens_applies_threshold_and_length() {
        let tokens = vec![
            OcrToken::new("Hello", 90.0),
            OcrToken::new("a", 99.0),
            OcrToken::new("noise", 15.0),
            OcrToken::new("  ok ", 16.0),
            OcrToken::new("   ", 80.0),
        ];
        let kept: Vec<&str> = filter_tokens(&tokens, 15.0).iter().map(|t| t.text.as_str()).collect();
        assert_eq!(kept, vec!["Hello", "  ok "]);
    }

    #[test]
    fn test_attempt_confidence_is_mean_of_kept_tokens() {
        let tokens = vec![
            OcrToken::new("Hello", 90.0),
            OcrToken::new("world", 80.0),
            OcrToken::new("x", 10.0),
        ];
        let attempt = OcrAttempt::from_tokens("English Focus", &tokens, 15.0);
        assert_eq!(attempt.text, "Hello world");
        assert_eq!(attempt.token_count, 2);
        assert!((attempt.confidence - 85.0).abs() < f32::EPSILON);
        assert_eq!(attempt.script_label(), "Latin");
    }

    #[test]
    fn test_attempt_without_tokens_has_zero_confidence() {
        let attempt = OcrAttempt::from_tokens("Sparse Text", &[], 15.0);
        assert_eq!(attempt.confidence, 0.0);
        assert!(attempt.text.is_empty());
        assert!(attempt.scripts.is_empty());
    }

    #[test]
    fn test_select_canonical_prefers_higher_score() {
        let weights = QualityWeights::default();
        let attempts = vec![
            attempt("A", "short text", 60.0),
            attempt("B", "a considerably longer piece of recognised text", 55.0),
        ];
        assert_eq!(select_canonical(&attempts, &weights), Some(1));
    }

    #[test]
    fn test_select_canonical_tie_goes_to_earlier_pass() {
        let weights = QualityWeights::default();
        let attempts = vec![attempt("A", "same text", 80.0), attempt("B", "same text", 80.0)];
        assert_eq!(select_canonical(&attempts, &weights), Some(0));
    }

    #[test]
    fn test_select_canonical_skips_empty_and_failed() {
        let weights = QualityWeights::default();
        let attempts = vec![
            OcrAttempt::failed("A", OcrError::RecognitionFailed { details: "boom".into() }),
            OcrAttempt::from_tokens("B", &[], 15.0),
        ];
        assert_eq!(select_canonical(&attempts, &weights), None);
    }

    #[test]
    fn test_preview_truncates_long_text() {
        let long = "word ".repeat(100);
        let a = attempt("A", long.trim(), 70.0);
        let preview = a.preview();
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(attempt("B", "short", 70.0).preview(), "short");
    }

    #[test]
    fn test_attempts_by_confidence_is_stable() {
        let report = OcrReport::from_attempts(
            vec![
                attempt("first", "alpha beta", 50.0),
                attempt("second", "gamma delta", 90.0),
                attempt("third", "epsilon zeta", 50.0),
            ],
            &QualityWeights::default(),
        );
        let order: Vec<&str> = report.attempts_by_confidence().iter().map(|a| a.method.as_str()).collect();
        assert_eq!(order, vec!["second", "first", "third"]);
    }

    #[test]
    fn test_report_unions_scripts() {
        let report = OcrReport::from_attempts(
            vec![attempt("A", "Hello", 50.0), attempt("B", "Привет", 40.0)],
            &QualityWeights::default(),
        );
        assert!(report.detected_scripts.contains(&Script::Latin));
        assert!(report.detected_scripts.contains(&Script::Cyrillic));
    }

    #[test]
    fn test_engine_unavailable_requires_every_pass() {
        let missing = OcrError::TesseractNotInstalled { details: "x".into() };
        let all_missing = vec![OcrAttempt::failed("A", missing.clone()), OcrAttempt::failed("B", missing.clone())];
        assert_eq!(engine_unavailable(&all_missing), Some(missing.clone()));

        let mixed = vec![OcrAttempt::failed("A", missing), attempt("B", "text here", 50.0)];
        assert_eq!(engine_unavailable(&mixed), None);
    }
}
