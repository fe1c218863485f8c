//! Types exchanged with a processing engine.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::job::JobKind;
use crate::normalizer::ProcessingConfig;

/// Everything the engine needs to run one job.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub job_id: String,
    pub kind: JobKind,
    /// Shared with the orchestrator; never mutated after admission.
    pub config: Arc<ProcessingConfig>,
    pub target_path: PathBuf,
    pub source_paths: Vec<PathBuf>,
    pub output_path: PathBuf,
}

/// What a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct EngineOutcome {
    pub job_id: String,
    pub output_path: PathBuf,
    pub output_size_bytes: u64,
    pub duration_ms: u64,
}
