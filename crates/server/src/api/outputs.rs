//! Artifact download and deletion handlers.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use mediajob_core::RetrievalError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

use super::error::{bad_input, internal, not_found, ApiError};
use crate::state::AppState;

/// Query parameters for downloads
#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    /// Delete the artifact once it has been streamed in full (default true)
    pub cleanup: Option<bool>,
}

/// Response for an explicit delete
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub status: String,
    pub filename: String,
}

fn retrieval_error(err: RetrievalError) -> ApiError {
    match err {
        RetrievalError::NotFound(_) => not_found("Output file not found"),
        RetrievalError::InvalidName(name) => bad_input(format!("Invalid file name: {}", name)),
        RetrievalError::Io { .. } => {
            error!("Artifact access failed: {}", err);
            internal(err.to_string())
        }
    }
}

/// Stream an artifact as an attachment.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    Query(params): Query<DownloadParams>,
) -> Result<Response, impl IntoResponse> {
    let cleanup = params.cleanup.unwrap_or(true);
    let artifact = match state.retrieval().fetch(&filename).await {
        Ok(artifact) => artifact,
        Err(e) => return Err(retrieval_error(e)),
    };

    debug!(file = %filename, size = artifact.size(), cleanup, "Serving artifact");

    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.file_name()),
        ),
        (header::CONTENT_LENGTH, artifact.size().to_string()),
    ];
    let body = Body::from_stream(artifact.into_stream(cleanup));

    Ok((headers, body).into_response())
}

/// Remove an artifact without downloading it.
pub async fn delete_output(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Json<DeleteResponse>, impl IntoResponse> {
    match state.retrieval().delete_output(&filename).await {
        Ok(deleted) => Ok(Json(DeleteResponse {
            status: "deleted".to_string(),
            filename: deleted.file_name,
        })),
        Err(e) => Err(retrieval_error(e)),
    }
}
