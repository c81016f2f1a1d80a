//! Recognition and container extraction.
//!
//! `engine` drives the multi-pass OCR over a pluggable `backend`; `pdf` and
//! `xml_extractor` handle the page-based and word-processing containers.

pub mod backend;
pub mod engine;
pub mod error;
pub mod languages;
pub mod passes;
pub mod pdf;
pub mod preprocessing;
pub mod script;
pub mod xml_extractor;

pub use backend::{OcrBackend, OcrToken, PassRequest};
pub use engine::{MultiPassOcrEngine, OcrAttempt, OcrReport, QualityWeights};
pub use error::OcrError;
pub use languages::{LanguageCatalog, StaticLanguageCatalog, TesseractLanguageCatalog};
