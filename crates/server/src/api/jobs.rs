//! Job submission and status handlers.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use mediajob_core::{
    Admission, Job, JobKind, JobStatus, RawProcessRequest, SubmitError, SubmitRequest, Upload,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::{bad_input, internal, not_found, unavailable, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    /// Maximum number of jobs to return (clamped to 1..=200, default 50)
    pub limit: Option<usize>,
}

/// Job as reported to clients
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub job_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub output_path: Option<String>,
    /// Name to pass to the download and delete endpoints.
    pub output_file: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            output_file: job.output_file_name().map(str::to_string),
            job_id: job.job_id,
            kind: job.kind,
            status: job.status,
            output_path: job.output_path,
            error: job.error_message,
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit an image job (multipart: `target`, optional `source`, parameters).
pub async fn submit_image(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Admission>), impl IntoResponse> {
    submit(state, JobKind::Image, multipart).await
}

/// Submit a video job (multipart: `target`, optional `source`, parameters).
pub async fn submit_video(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Admission>), impl IntoResponse> {
    submit(state, JobKind::Video, multipart).await
}

async fn submit(
    state: Arc<AppState>,
    kind: JobKind,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Admission>), ApiError> {
    let request = read_submission(kind, multipart).await?;

    match state.orchestrator().submit(request).await {
        Ok(admission) => Ok((StatusCode::ACCEPTED, Json(admission))),
        Err(SubmitError::BadInput(e)) => {
            debug!(kind = %kind, error = %e, "Rejected submission");
            Err(bad_input(e.to_string()))
        }
        Err(SubmitError::Unavailable { job_id, reason }) => {
            warn!(kind = %kind, job_id = ?job_id, "Could not admit job: {}", reason);
            Err(unavailable(reason))
        }
    }
}

/// Collect the multipart form into a submission.
///
/// Unknown fields are ignored. A missing target is left for admission to
/// report, so the error wording stays in one place.
async fn read_submission(
    kind: JobKind,
    mut multipart: Multipart,
) -> Result<SubmitRequest, ApiError> {
    let mut target: Option<Upload> = None;
    let mut source: Option<Upload> = None;
    let mut params = RawProcessRequest::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(bad_input(format!("Malformed multipart body: {}", e))),
        };
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "target" | "source" => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_input(format!("Failed to read {}: {}", name, e)))?;
                let mut upload = Upload::new(bytes.to_vec());
                if let Some(file_name) = file_name {
                    upload = upload.with_file_name(file_name);
                }
                if name == "target" {
                    target = Some(upload);
                } else {
                    source = Some(upload);
                }
            }
            _ => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| bad_input(format!("Failed to read {}: {}", name, e)))?;
                if !params.set_field(&name, text) {
                    debug!(field = %name, "Ignoring unknown form field");
                }
            }
        }
    }

    let mut request = SubmitRequest::new(kind, target.unwrap_or_else(|| Upload::new(Vec::new())))
        .with_params(params);
    if let Some(source) = source {
        request = request.with_source(source);
    }
    Ok(request)
}

/// Get a job by id
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, impl IntoResponse> {
    match state.orchestrator().get(&job_id) {
        Ok(Some(job)) => Ok(Json(JobResponse::from(job))),
        Ok(None) => Err(not_found("Job not found")),
        Err(e) => Err(internal(e.to_string())),
    }
}

/// List the most recent jobs, newest first
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<Vec<JobResponse>>, impl IntoResponse> {
    match state.orchestrator().list(params.limit) {
        Ok(jobs) => Ok(Json(jobs.into_iter().map(JobResponse::from).collect())),
        Err(e) => Err(internal(e.to_string())),
    }
}
