//! Job storage trait and types.

use thiserror::Error;

use super::{Job, JobKind, JobStatus};

/// Maximum number of jobs a single listing may return.
pub const MAX_LIST_LIMIT: usize = 200;

/// Listing size when the caller does not ask for one.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Error type for ledger operations.
#[derive(Debug, Error)]
pub enum JobError {
    /// A job with this id was already admitted.
    #[error("job already exists: {0}")]
    AlreadyExists(String),

    /// No job with this id.
    #[error("job not found: {0}")]
    NotFound(String),

    /// The state machine does not allow this move.
    #[error("job {job_id}: cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    /// The fields supplied with a status change break a record invariant.
    #[error("job {job_id}: invalid update: {reason}")]
    InvalidUpdate { job_id: String, reason: String },

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

/// Request to create a new job row.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_id: String,
    pub kind: JobKind,
    pub target_path: String,
    pub source_paths: Vec<String>,
    /// Output location allocated at admission. Kept apart from the public
    /// `output_path`, which stays empty until completion.
    pub reserved_output_path: String,
}

/// Trait for job ledger backends.
///
/// Implementations must apply each call atomically: two updates for the same
/// id serialize, and neither may be built from a stale read of the other.
pub trait JobStore: Send + Sync {
    /// Insert a new job in `submitted` state. Fails with `AlreadyExists` if the id is taken.
    fn create(&self, job: NewJob) -> Result<Job, JobError>;

    /// Move a job to `status`, merging the optional fields.
    ///
    /// `output_path` only overwrites when a non-empty value is given; when
    /// completing without one, the reserved output path is promoted. `error`
    /// always replaces the stored value.
    fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        output_path: Option<&str>,
        error: Option<&str>,
    ) -> Result<Job, JobError>;

    /// Get a job by id.
    fn get(&self, job_id: &str) -> Result<Option<Job>, JobError>;

    /// Most recently created jobs first, at most `limit`.
    fn list(&self, limit: usize) -> Result<Vec<Job>, JobError>;

    /// Count jobs, optionally only those in `status`.
    fn count(&self, status: Option<JobStatus>) -> Result<i64, JobError>;
}

/// Clamp a client-supplied listing size into `1..=MAX_LIST_LIMIT`.
pub fn clamp_list_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_list_limit() {
        assert_eq!(clamp_list_limit(None), 50);
        assert_eq!(clamp_list_limit(Some(0)), 1);
        assert_eq!(clamp_list_limit(Some(10)), 10);
        assert_eq!(clamp_list_limit(Some(5000)), 200);
    }

    #[test]
    fn test_error_display() {
        let err = JobError::InvalidTransition {
            job_id: "abc".into(),
            from: JobStatus::Completed,
            to: JobStatus::Running,
        };
        assert_eq!(err.to_string(), "job abc: cannot move from completed to running");
    }
}
