//! Error bodies shared by the API handlers.

use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// "bad_input", "unavailable", "not_found" or "internal"
    pub kind: &'static str,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, kind: &'static str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            kind,
        }),
    )
}

pub fn bad_input(message: impl Into<String>) -> ApiError {
    error(StatusCode::BAD_REQUEST, "bad_input", message)
}

pub fn unavailable(message: impl Into<String>) -> ApiError {
    error(StatusCode::SERVICE_UNAVAILABLE, "unavailable", message)
}

pub fn not_found(message: impl Into<String>) -> ApiError {
    error(StatusCode::NOT_FOUND, "not_found", message)
}

pub fn internal(message: impl Into<String>) -> ApiError {
    error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}
