//! File staging: uploads in, artifacts out, nothing left behind.

mod guard;
mod manager;

use std::path::{Path, PathBuf};
use thiserror::Error;

pub use guard::StagedFiles;
pub use manager::{release, release_blocking, FileStaging};

/// Errors from the staging areas.
#[derive(Debug, Error)]
pub enum StagingError {
    /// Reading or writing a staged file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A client-supplied name does not denote a single file in the output area.
    #[error("invalid file name: {0:?}")]
    InvalidName(String),
}

impl StagingError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
