//! Scratch and output areas on disk.

use std::path::{Component, Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::StagingError;
use crate::config::StorageConfig;
use crate::job::JobKind;
use crate::normalizer::sanitize_extension;

/// Extension for staged uploads whose extension could not be trusted.
const FALLBACK_EXTENSION: &str = "bin";

/// Default extension for image outputs when the target's is unknown.
const DEFAULT_IMAGE_EXTENSION: &str = "png";

/// Container written for every video output.
const VIDEO_OUTPUT_EXTENSION: &str = "mp4";

/// Owns the upload scratch area and the output area.
///
/// Every name it hands out is a fresh UUID plus a sanitized extension, so no
/// two jobs ever share a path and no client input reaches the file system.
#[derive(Debug, Clone)]
pub struct FileStaging {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

impl FileStaging {
    pub fn new(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.upload_dir, &config.output_dir)
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create both areas if they do not exist yet.
    pub async fn ensure_dirs(&self) -> Result<(), StagingError> {
        for dir in [&self.upload_dir, &self.output_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StagingError::io(dir, e))?;
        }
        Ok(())
    }

    /// Pick a fresh scratch path without touching the disk.
    pub fn reserve(&self, extension: &str) -> PathBuf {
        let ext = sanitize_extension(extension).unwrap_or_else(|| FALLBACK_EXTENSION.to_string());
        self.upload_dir.join(unique_name(&ext))
    }

    /// Write an upload to a path obtained from [`reserve`](Self::reserve).
    ///
    /// Refuses to overwrite. A partially written file is removed before the error is returned.
    pub async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StagingError> {
        let result = async {
            let mut file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
                .await?;
            file.write_all(bytes).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = result {
            if e.kind() != std::io::ErrorKind::AlreadyExists {
                release(path).await;
            }
            return Err(StagingError::io(path, e));
        }

        debug!("Staged {} bytes at {}", bytes.len(), path.display());
        Ok(())
    }

    /// Write an upload to a fresh scratch path and return it.
    pub async fn stage(&self, bytes: &[u8], extension: &str) -> Result<PathBuf, StagingError> {
        let path = self.reserve(extension);
        self.write(&path, bytes).await?;
        Ok(path)
    }

    /// Pick a fresh output path for a job of `kind`.
    ///
    /// Images keep the target's extension so the engine writes the same
    /// format back; videos are always written as MP4.
    pub fn allocate_output_path(&self, kind: JobKind, target_extension: Option<&str>) -> PathBuf {
        let ext = match kind {
            JobKind::Image => target_extension
                .and_then(sanitize_extension)
                .unwrap_or_else(|| DEFAULT_IMAGE_EXTENSION.to_string()),
            JobKind::Video => VIDEO_OUTPUT_EXTENSION.to_string(),
        };
        self.output_dir.join(unique_name(&ext))
    }

    /// Map a client-supplied output file name to a path inside the output area.
    pub fn resolve_output(&self, file_name: &str) -> Result<PathBuf, StagingError> {
        let mut components = Path::new(file_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if !file_name.contains(['/', '\\']) => {
                Ok(self.output_dir.join(name))
            }
            _ => Err(StagingError::InvalidName(file_name.to_string())),
        }
    }
}

fn unique_name(extension: &str) -> String {
    format!("{}.{}", uuid::Uuid::new_v4(), extension)
}

/// Best-effort delete. A missing file is not an error; other failures are logged.
pub async fn release(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Released {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to release {}: {}", path.display(), e),
    }
}

/// Blocking variant of [`release`] for drop paths.
pub fn release_blocking(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Released {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to release {}: {}", path.display(), e),
    }
}
