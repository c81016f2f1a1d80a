pub mod config;
pub mod cpu_allocation;
pub mod extraction;
pub mod models;
pub mod ocr;
pub mod routes;
pub mod storage;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;


use std::sync::Arc;

use crate::config::Config;
use crate::extraction::service::ExtractionService;
use crate::ocr::languages::LanguageCatalog;

/// Shared state handed to every HTTP handler.
pub struct AppState {
    pub config: Config,
    pub extraction: ExtractionService,
    pub languages: Arc<dyn LanguageCatalog>,
}

impl AppState {
    pub fn new(config: Config, extraction: ExtractionService) -> Self {
        let languages = extraction.language_catalog();
        Self {
            config,
            extraction,
            languages,
        }
    }

    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let extraction = ExtractionService::from_config(&config)?;
        Ok(Self::new(config, extraction))
    }
}
