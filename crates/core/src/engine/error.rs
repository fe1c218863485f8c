//! Error types for the engine module.

use std::path::PathBuf;
use thiserror::Error;

/// Longest stderr excerpt carried into a job's error message.
const STDERR_EXCERPT_CHARS: usize = 500;

/// Errors that can occur while running the processing engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine program not found.
    #[error("engine program not found: {}", path.display())]
    ProgramNotFound { path: PathBuf },

    /// A staged input disappeared before the engine ran.
    #[error("input file not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    /// Output directory does not exist and could not be created.
    #[error("failed to create output directory: {}", path.display())]
    OutputDirectoryFailed { path: PathBuf },

    /// The engine ran and reported failure.
    #[error("processing failed: {reason}")]
    ProcessFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// The engine did not finish in time and was killed.
    #[error("processing timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The engine cannot take work right now.
    #[error("engine unavailable: {reason}")]
    Unavailable { reason: String },

    /// I/O error while driving the engine.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Creates a process failure with optional captured stderr.
    pub fn process_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ProcessFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Text recorded on the failed job: the error plus the tail of stderr, if any.
    pub fn job_message(&self) -> String {
        match self {
            Self::ProcessFailed {
                stderr: Some(stderr),
                ..
            } if !stderr.trim().is_empty() => {
                let trimmed = stderr.trim();
                let start = trimmed
                    .char_indices()
                    .rev()
                    .nth(STDERR_EXCERPT_CHARS.saturating_sub(1))
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                format!("{}: {}", self, &trimmed[start..])
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_message_includes_stderr_tail() {
        let err = EngineError::process_failed("exit code 1", Some("\nno face detected\n".into()));
        assert_eq!(
            err.job_message(),
            "processing failed: exit code 1: no face detected"
        );
    }

    #[test]
    fn test_job_message_truncates_long_stderr() {
        let long = "x".repeat(2000) + "END";
        let err = EngineError::process_failed("exit code 1", Some(long));
        let message = err.job_message();
        assert!(message.ends_with("END"));
        assert!(message.len() < 600);
    }

    #[test]
    fn test_job_message_without_stderr() {
        let err = EngineError::Timeout { timeout_secs: 5 };
        assert_eq!(err.job_message(), "processing timed out after 5 seconds");
    }
}
