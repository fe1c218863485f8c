use axum::{extract::State, http::header, response::IntoResponse, Json};
use chrono::Utc;
use mediajob_core::{OrchestratorStatus, SanitizedConfig, KNOWN_PROCESSORS};
use serde::Serialize;
use std::sync::Arc;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub health: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub engine: String,
    pub processors_available: Vec<String>,
    pub execution_providers: Vec<String>,
    pub uptime_secs: i64,
    pub jobs: OrchestratorStatus,
}

#[derive(Serialize)]
pub struct ProcessorInfo {
    pub name: String,
    pub available: bool,
}

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "mediajob API".to_string(),
        version: VERSION.to_string(),
        health: "/api/v1/health".to_string(),
    })
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let capabilities = state.engine().capabilities().await;

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: VERSION.to_string(),
        engine: state.engine().name().to_string(),
        processors_available: capabilities.processors,
        execution_providers: capabilities.providers,
        uptime_secs: (Utc::now() - state.started_at()).num_seconds(),
        jobs: state.orchestrator().status(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// List every known processor and whether the engine offers it.
pub async fn list_processors(State(state): State<Arc<AppState>>) -> Json<Vec<ProcessorInfo>> {
    let capabilities = state.engine().capabilities().await;

    Json(
        KNOWN_PROCESSORS
            .iter()
            .map(|name| ProcessorInfo {
                name: name.to_string(),
                available: capabilities.has_processor(name),
            })
            .collect(),
    )
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
