//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Admission (submitted and rejected jobs)
//! - Execution (transitions, durations, jobs in flight)
//! - Retrieval (artifacts served and deleted)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Admission Metrics
// =============================================================================

/// Jobs admitted into the ledger.
pub static JOBS_SUBMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediajob_jobs_submitted_total", "Total jobs admitted"),
        &["kind"], // "image", "video"
    )
    .unwrap()
});

/// Submissions rejected before a job existed.
pub static JOBS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediajob_jobs_rejected_total",
            "Total submissions rejected during validation",
        ),
        &["reason"], // "missing_parameter", "content_mismatch", "missing_source"
    )
    .unwrap()
});

// =============================================================================
// Execution Metrics
// =============================================================================

/// Status transitions by target status.
pub static JOB_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediajob_job_transitions_total",
            "Total job status transitions",
        ),
        &["to"],
    )
    .unwrap()
});

/// Time from running to a terminal state.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mediajob_job_duration_seconds",
            "Duration of job execution",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0, 3600.0]),
        &["result"], // "completed", "failed"
    )
    .unwrap()
});

/// Jobs currently inside the engine.
pub static JOBS_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("mediajob_jobs_running", "Jobs currently running").unwrap()
});

// =============================================================================
// Retrieval Metrics
// =============================================================================

/// Artifacts fully streamed to a client.
pub static ARTIFACTS_SERVED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "mediajob_artifacts_served_total",
        "Total artifacts streamed to completion",
    )
    .unwrap()
});

/// Artifacts removed, by trigger.
pub static ARTIFACTS_DELETED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediajob_artifacts_deleted_total", "Total artifacts deleted"),
        &["trigger"], // "auto_cleanup", "request"
    )
    .unwrap()
});

/// Returns all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Admission
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOBS_REJECTED.clone()),
        // Execution
        Box::new(JOB_TRANSITIONS.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(JOBS_RUNNING.clone()),
        // Retrieval
        Box::new(ARTIFACTS_SERVED.clone()),
        Box::new(ARTIFACTS_DELETED.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register_once() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        JOB_TRANSITIONS.with_label_values(&["queued"]).inc();
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"mediajob_job_transitions_total".to_string()));
    }
}
