/*!
 * Multi-pass OCR engine tests
 *
 * The engine is driven by scripted backends so selection, failure
 * handling, deadlines and the worker limit can be checked without
 * tesseract installed.
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use docextract::ocr::engine::{AttemptStatus, MultiPassOcrEngine};
use docextract::ocr::error::OcrError;
use docextract::ocr::passes::{LanguageSet, OcrPass, SegmentationMode};
use docextract::ocr::script::Script;
use docextract::test_helpers::{create_test_engine, sample_png, test_language_catalog, tokens, ScriptedBackend};
use image::DynamicImage;
use tokio::time::Instant;

fn sample_image() -> DynamicImage {
    image::load_from_memory(&sample_png()).expect("sample PNG decodes")
}

#[tokio::test]
async fn test_highest_score_wins_regardless_of_pass_order() {
    let backend = ScriptedBackend::new(|request| match request.segmentation {
        SegmentationMode::SparseText => Ok(tokens(&[("Invoice", 95.0), ("number", 93.0), ("12345", 91.0)])),
        SegmentationMode::SingleLine => Ok(tokens(&[("Invoice", 60.0)])),
        _ => Ok(tokens(&[("lnvoice", 40.0), ("nurnber", 35.0)])),
    });
    let engine = create_test_engine(backend);

    let report = engine.recognize(sample_image(), None).await.expect("OCR should run");

    assert_eq!(report.attempts.len(), 6, "every default pass is recorded");
    let best = report.canonical_attempt().expect("a canonical attempt");
    assert_eq!(best.method, "Sparse Text");
    assert_eq!(report.text(), "Invoice number 12345");
    assert!(report.detected_scripts.contains(&Script::Latin));
    assert!(!report.is_truncated());
}

#[tokio::test]
async fn test_equal_scores_go_to_the_earlier_pass() {
    let engine = create_test_engine(ScriptedBackend::constant(tokens(&[("Hello", 80.0), ("world", 80.0)])));

    let report = engine.recognize(sample_image(), None).await.unwrap();

    assert_eq!(report.canonical, Some(0));
    assert_eq!(report.canonical_attempt().unwrap().method, engine.passes()[0].name);
}

#[tokio::test]
async fn test_selection_is_deterministic_across_runs() {
    let make_backend = || {
        ScriptedBackend::new(|request| {
            // Later passes finish first so completion order differs from pass order
            let delay = match request.segmentation {
                SegmentationMode::UniformBlock => 30,
                _ => 1,
            };
            std::thread::sleep(Duration::from_millis(delay));
            Ok(tokens(&[("Column", 70.0), ("text", 70.0)]))
        })
    };

    let mut methods = Vec::new();
    for _ in 0..3 {
        let engine = create_test_engine(make_backend());
        let report = engine.recognize(sample_image(), None).await.unwrap();
        methods.push(report.canonical_attempt().unwrap().method.clone());
    }

    assert!(methods.iter().all(|m| m == "All Languages Auto"), "got {:?}", methods);
}

#[tokio::test]
async fn test_low_confidence_and_short_tokens_are_dropped() {
    let engine = create_test_engine(ScriptedBackend::constant(tokens(&[
        ("Readable", 88.0),
        ("x", 99.0),
        ("noise", 10.0),
        ("  ", 90.0),
    ])));

    let report = engine.recognize(sample_image(), None).await.unwrap();
    let best = report.canonical_attempt().unwrap();

    assert_eq!(best.text, "Readable");
    assert_eq!(best.token_count, 1);
    assert_eq!(best.confidence, 88.0);
}

#[tokio::test]
async fn test_blank_image_yields_report_without_content() {
    let engine = create_test_engine(ScriptedBackend::blank());

    let report = engine.recognize(sample_image(), None).await.unwrap();

    assert!(!report.has_content());
    assert_eq!(report.text(), "");
    assert_eq!(report.completed_count(), 6);
}

#[tokio::test]
async fn test_failing_passes_are_recorded_not_fatal() {
    let backend = ScriptedBackend::new(|request| match request.segmentation {
        SegmentationMode::SingleLine => Err(OcrError::RecognitionFailed {
            details: "page too small".to_string(),
        }),
        _ => Ok(tokens(&[("Survives", 75.0)])),
    });
    let engine = create_test_engine(backend);

    let report = engine.recognize(sample_image(), None).await.unwrap();

    let failed: Vec<_> = report
        .attempts
        .iter()
        .filter(|a| matches!(a.status, AttemptStatus::Failed(_)))
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].method, "Single Text Line");
    assert!(failed[0].failure_reason().unwrap().contains("page too small"));
    assert_eq!(report.text(), "Survives");
}

#[tokio::test]
async fn test_missing_engine_is_an_error() {
    let engine = create_test_engine(ScriptedBackend::unavailable());

    let err = engine.recognize(sample_image(), None).await.unwrap_err();
    assert!(err.is_engine_unavailable());
}

#[tokio::test]
async fn test_undecodable_bytes_are_invalid_image() {
    let engine = create_test_engine(ScriptedBackend::blank());

    let err = engine.recognize_bytes(b"definitely not an image".to_vec(), None).await.unwrap_err();
    assert!(matches!(err, OcrError::InvalidImageFormat { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_deadline_truncates_slow_passes() {
    let backend = ScriptedBackend::new(|request| {
        if request.segmentation == SegmentationMode::SparseText {
            std::thread::sleep(Duration::from_millis(1500));
        }
        Ok(tokens(&[("Quick", 80.0)]))
    });
    let engine = create_test_engine(backend);

    let deadline = Instant::now() + Duration::from_millis(500);
    let report = engine.recognize(sample_image(), Some(deadline)).await.unwrap();

    assert!(report.is_truncated());
    assert_eq!(report.completed_count(), 5);
    let timed_out = report
        .attempts
        .iter()
        .find(|a| a.status == AttemptStatus::TimedOut)
        .expect("the slow pass timed out");
    assert_eq!(timed_out.method, "Sparse Text");
    assert_eq!(report.text(), "Quick");
}

#[tokio::test]
async fn test_deadline_before_any_pass_completes() {
    let backend = ScriptedBackend::new(|_| {
        std::thread::sleep(Duration::from_millis(800));
        Ok(tokens(&[("Late", 90.0)]))
    });
    let engine = create_test_engine(backend);

    let deadline = Instant::now() + Duration::from_millis(100);
    let err = engine.recognize(sample_image(), Some(deadline)).await.unwrap_err();
    assert_eq!(err, OcrError::DeadlineExceeded);
}

#[tokio::test]
async fn test_worker_limit_bounds_concurrent_passes() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let backend = {
        let active = Arc::clone(&active);
        let peak = Arc::clone(&peak);
        ScriptedBackend::new(move |_| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(40));
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(tokens(&[("Bounded", 70.0)]))
        })
    };

    let engine = MultiPassOcrEngine::new(Arc::new(backend), test_language_catalog(), 2);
    let report = engine.recognize(sample_image(), None).await.unwrap();

    assert_eq!(report.completed_count(), 6);
    assert!(peak.load(Ordering::SeqCst) <= 2, "peak concurrency {}", peak.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_passes_receive_resolved_languages() {
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let backend = {
        let seen = Arc::clone(&seen);
        ScriptedBackend::new(move |request| {
            seen.lock().unwrap().push(request.languages.to_string());
            Ok(Vec::new())
        })
    };

    let engine = create_test_engine(backend).with_passes(vec![
        OcrPass::new("Installed", SegmentationMode::UniformBlock, LanguageSet::Installed),
        OcrPass::new("English", SegmentationMode::UniformBlock, LanguageSet::Single("eng")),
    ]);
    engine.recognize(sample_image(), None).await.unwrap();

    let mut seen = seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["deu+eng+fra".to_string(), "eng".to_string()]);
}

#[tokio::test]
async fn test_scripts_are_collected_across_passes() {
    let backend = ScriptedBackend::new(|request| match request.segmentation {
        SegmentationMode::SparseText => Ok(tokens(&[("morning", 60.0)])),
        _ => Ok(tokens(&[("Καλημέρα", 85.0)])),
    });
    let engine = create_test_engine(backend);

    let report = engine.recognize(sample_image(), None).await.unwrap();

    let best = report.canonical_attempt().unwrap();
    assert_eq!(best.script_label(), "Greek");
    assert!(report.detected_scripts.contains(&Script::Greek));
    assert!(report.detected_scripts.contains(&Script::Latin));
}
