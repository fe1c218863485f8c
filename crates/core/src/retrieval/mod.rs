//! Serving and deleting produced artifacts.

mod artifact;

use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

use crate::metrics;
use crate::staging::{FileStaging, StagingError};

pub use artifact::Artifact;

/// Errors from artifact retrieval.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// No artifact with this name.
    #[error("output file not found: {0}")]
    NotFound(String),

    /// The name does not denote a file in the output area.
    #[error("invalid output file name: {0:?}")]
    InvalidName(String),

    /// The artifact exists but could not be read or removed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<StagingError> for RetrievalError {
    fn from(err: StagingError) -> Self {
        match err {
            StagingError::InvalidName(name) => Self::InvalidName(name),
            StagingError::Io { path, source } => Self::Io { path, source },
        }
    }
}

/// Result of an explicit delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deleted {
    pub file_name: String,
}

/// Looks up artifacts in the output area by file name.
#[derive(Debug, Clone)]
pub struct OutputRetrieval {
    staging: FileStaging,
}

impl OutputRetrieval {
    pub fn new(staging: FileStaging) -> Self {
        Self { staging }
    }

    /// Open an artifact for streaming.
    pub async fn fetch(&self, file_name: &str) -> Result<Artifact, RetrievalError> {
        let path = self.staging.resolve_output(file_name)?;
        Artifact::open(file_name, path).await
    }

    /// Remove an artifact.
    pub async fn delete_output(&self, file_name: &str) -> Result<Deleted, RetrievalError> {
        let path = self.staging.resolve_output(file_name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                metrics::ARTIFACTS_DELETED
                    .with_label_values(&["request"])
                    .inc();
                info!("Deleted output {}", file_name);
                Ok(Deleted {
                    file_name: file_name.to_string(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RetrievalError::NotFound(file_name.to_string()))
            }
            Err(e) => Err(RetrievalError::Io { path, source: e }),
        }
    }
}
