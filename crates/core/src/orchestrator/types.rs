//! Types for the job orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::{JobKind, JobStatus};
use crate::normalizer::{NormalizeError, RawProcessRequest};

/// One uploaded file as received from the client.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    /// Client-side file name. Only used for logging.
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A request to process one target file.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub kind: JobKind,
    pub target: Upload,
    /// Image supplying the face or style, when the processors need one.
    pub source: Option<Upload>,
    pub params: RawProcessRequest,
}

impl SubmitRequest {
    pub fn new(kind: JobKind, target: Upload) -> Self {
        Self {
            kind,
            target,
            source: None,
            params: RawProcessRequest::default(),
        }
    }

    pub fn with_source(mut self, source: Upload) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_params(mut self, params: RawProcessRequest) -> Self {
        self.params = params;
        self
    }
}

/// A job that made it through admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admission {
    pub job_id: String,
    pub status: JobStatus,
}

/// Why a submission was not accepted.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The request itself is wrong. No job was created.
    #[error(transparent)]
    BadInput(#[from] NormalizeError),

    /// The service could not admit the job. If a row was written it is now failed.
    #[error("service unavailable: {reason}")]
    Unavailable {
        job_id: Option<String>,
        reason: String,
    },
}

impl SubmitError {
    pub(crate) fn unavailable(job_id: Option<&str>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            job_id: job_id.map(str::to_string),
            reason: reason.into(),
        }
    }
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Background executions dispatched and not yet finished.
    pub active_executions: usize,
    /// Jobs waiting in `submitted`.
    pub submitted_count: usize,
    /// Jobs waiting in `queued`.
    pub queued_count: usize,
    /// Jobs inside the engine.
    pub running_count: usize,
    /// Jobs that finished successfully.
    pub completed_count: usize,
    /// Jobs that failed.
    pub failed_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_request_builder() {
        let request = SubmitRequest::new(JobKind::Image, Upload::new(vec![1, 2, 3]))
            .with_source(Upload::new(vec![4]).with_file_name("face.jpg"));

        assert_eq!(request.target.bytes, vec![1, 2, 3]);
        assert_eq!(
            request.source.unwrap().file_name.as_deref(),
            Some("face.jpg")
        );
    }

    #[test]
    fn test_bad_input_display_is_the_validation_message() {
        let err: SubmitError = NormalizeError::MissingParameter("target".into()).into();
        assert_eq!(err.to_string(), "missing required parameter: target");
    }

    #[test]
    fn test_status_serialization() {
        let status = OrchestratorStatus {
            active_executions: 2,
            queued_count: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["active_executions"], 2);
        assert_eq!(json["queued_count"], 1);
    }
}
