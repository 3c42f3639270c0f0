use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the update and asset-sync passes.
///
/// None of these escape the orchestrator or the synchronizer: both catch them per
/// item, log them and fold them into their reports.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("manifest unavailable: {0}")]
    ManifestUnavailable(String),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to extract archive: {0}")]
    Extraction(String),

    #[error("failed to restore backup of {name}: {reason}")]
    BackupRestore { name: String, reason: String },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("path escapes its target directory: {0}")]
    UnsafePath(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn network(url: &str, reason: impl ToString) -> Self {
        SyncError::Network {
            url: url.to_owned(),
            reason: reason.to_string(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Write {
            path: path.into(),
            source,
        }
    }
}

impl From<zip::result::ZipError> for SyncError {
    fn from(err: zip::result::ZipError) -> Self {
        SyncError::Extraction(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Config(err.to_string())
    }
}
