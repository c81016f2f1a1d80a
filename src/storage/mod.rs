//! Transient storage for uploaded documents.
//!
//! Uploads only live on disk while a single extraction runs; nothing is
//! persisted between requests.

pub mod local;

pub use local::{StagedUpload, UploadStaging};
