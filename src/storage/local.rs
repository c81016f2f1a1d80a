//! Local filesystem staging for uploads that are being extracted

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, error};

/// Writes uploaded bytes to a private temporary file for the lifetime of
/// a single extraction.
#[derive(Debug, Clone)]
pub struct UploadStaging {
    upload_path: PathBuf,
}

impl UploadStaging {
    pub fn new(upload_path: impl Into<PathBuf>) -> Self {
        Self {
            upload_path: upload_path.into(),
        }
    }

    /// Get the base upload path
    pub fn upload_path(&self) -> &Path {
        &self.upload_path
    }

    /// Create the upload directory if it does not exist yet
    pub async fn initialize(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.upload_path).await
    }

    /// Persist `data` under a random name that keeps the declared extension.
    ///
    /// The returned guard removes the file when dropped, so every exit path
    /// of the request releases it.
    pub fn stage(&self, extension: &str, data: &[u8]) -> std::io::Result<StagedUpload> {
        let suffix = if extension.is_empty() {
            String::new()
        } else {
            format!(".{}", extension)
        };

        std::fs::create_dir_all(&self.upload_path)?;

        let mut file = Builder::new()
            .prefix("docextract-")
            .suffix(&suffix)
            .tempfile_in(&self.upload_path)
            .map_err(|e| {
                error!("Failed to create staging file in {}: {}", self.upload_path.display(), e);
                e
            })?;

        file.write_all(data)?;
        file.flush()?;

        debug!("Staged {} bytes at {}", data.len(), file.path().display());

        Ok(StagedUpload {
            file,
            size_bytes: data.len() as u64,
        })
    }
}

/// A staged upload; the backing file is deleted on drop
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
    size_bytes: u64,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        debug!("Releasing staged upload {}", self.file.path().display());
    }
}
