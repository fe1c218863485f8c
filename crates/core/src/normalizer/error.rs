//! Error types for request normalization.

use thiserror::Error;

use crate::job::JobKind;

/// Which upload a validation error is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRole {
    Target,
    Source,
}

impl InputRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputRole::Target => "target",
            InputRole::Source => "source",
        }
    }
}

impl std::fmt::Display for InputRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejections raised before any job exists.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// A required upload or field was absent or empty.
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    /// The upload's content is not the declared media kind.
    #[error("{role} file is not a valid {expected}")]
    ContentMismatch {
        role: InputRole,
        expected: JobKind,
        detected: Option<JobKind>,
    },

    /// A selected processor needs a source image and none was uploaded.
    #[error("source file is required for processors: {}", processors.join(", "))]
    MissingSource { processors: Vec<String> },
}
