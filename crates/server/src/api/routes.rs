use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::middleware::metrics_middleware;
use super::{handlers, jobs, outputs};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config().server.max_upload_bytes;

    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/processors", get(handlers::list_processors))
        .route("/metrics", get(handlers::metrics))
        // Submission
        .route("/process/image", post(jobs::submit_image))
        .route("/process/video", post(jobs::submit_video))
        // Jobs
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/{job_id}", get(jobs::get_job))
        // Artifacts
        .route("/download/{filename}", get(outputs::download))
        .route("/output/{filename}", delete(outputs::delete_output))
        .with_state(state);

    Router::new()
        .route("/", get(handlers::root))
        .nest("/api/v1", api_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
