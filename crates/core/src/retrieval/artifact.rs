//! A produced file opened for transfer.

use std::path::PathBuf;

use futures::{Stream, TryStreamExt};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use super::RetrievalError;
use crate::metrics;
use crate::staging::release;

const CHUNK_SIZE: usize = 64 * 1024;

/// An open artifact. Nothing is deleted unless the stream is drained.
#[derive(Debug)]
pub struct Artifact {
    file_name: String,
    path: PathBuf,
    size: u64,
    file: File,
}

struct Transfer {
    file: File,
    file_name: String,
    path: PathBuf,
    auto_cleanup: bool,
}

impl Artifact {
    pub(super) async fn open(file_name: &str, path: PathBuf) -> Result<Self, RetrievalError> {
        let not_found = || RetrievalError::NotFound(file_name.to_string());

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(RetrievalError::Io { path, source: e }),
        };
        let meta = match file.metadata().await {
            Ok(meta) => meta,
            Err(e) => return Err(RetrievalError::Io { path, source: e }),
        };
        if !meta.is_file() {
            return Err(not_found());
        }

        Ok(Self {
            file_name: file_name.to_string(),
            path,
            size: meta.len(),
            file,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Stream the artifact in chunks.
    ///
    /// With `auto_cleanup` the file is released after the last chunk has been
    /// yielded. A stream dropped early, or one that hits a read error, leaves
    /// the file in place.
    pub fn into_stream(
        self,
        auto_cleanup: bool,
    ) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Send + 'static {
        let transfer = Transfer {
            file: self.file,
            file_name: self.file_name,
            path: self.path,
            auto_cleanup,
        };

        futures::stream::unfold(Some(transfer), |state| async move {
            let mut transfer = state?;
            let mut buf = vec![0u8; CHUNK_SIZE];
            match transfer.file.read(&mut buf).await {
                Ok(0) => {
                    metrics::ARTIFACTS_SERVED.inc();
                    if transfer.auto_cleanup {
                        drop(transfer.file);
                        release(&transfer.path).await;
                        metrics::ARTIFACTS_DELETED
                            .with_label_values(&["auto_cleanup"])
                            .inc();
                        info!("Served and removed output {}", transfer.file_name);
                    }
                    None
                }
                Ok(n) => {
                    buf.truncate(n);
                    Some((Ok(buf), Some(transfer)))
                }
                Err(e) => {
                    warn!("Read failed on output {}: {}", transfer.file_name, e);
                    Some((Err(e), None))
                }
            }
        })
    }

    /// Read the whole artifact into memory.
    pub async fn read_all(self, auto_cleanup: bool) -> std::io::Result<Vec<u8>> {
        self.into_stream(auto_cleanup).try_concat().await
    }
}
