//! Job orchestrator implementation.
//!
//! Admission runs inside the caller's request and ends with the job queued.
//! Execution runs on its own task and always ends in a terminal state.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::engine::{EngineRequest, ProcessingEngine};
use crate::job::{clamp_list_limit, Job, JobError, JobKind, JobStatus, JobStore, NewJob};
use crate::metrics;
use crate::normalizer::{
    validate_upload, InputRole, NormalizeError, ProcessingConfig, RawProcessRequest,
    RequestNormalizer, SniffedMedia,
};
use crate::staging::{FileStaging, StagedFiles};

use super::types::{Admission, OrchestratorStatus, SubmitError, SubmitRequest, Upload};

/// Admits jobs and drives each one to a terminal state.
pub struct JobOrchestrator {
    store: Arc<dyn JobStore>,
    staging: FileStaging,
    engine: Arc<dyn ProcessingEngine>,
    active: Arc<AtomicUsize>,
}

impl JobOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        store: Arc<dyn JobStore>,
        staging: FileStaging,
        engine: Arc<dyn ProcessingEngine>,
    ) -> Self {
        Self {
            store,
            staging,
            engine,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn staging(&self) -> &FileStaging {
        &self.staging
    }

    pub fn engine(&self) -> &Arc<dyn ProcessingEngine> {
        &self.engine
    }

    /// Validate, record and dispatch a job.
    ///
    /// Returns once the job is queued. Validation failures create nothing;
    /// later admission failures leave a failed row behind.
    pub async fn submit(&self, request: SubmitRequest) -> Result<Admission, SubmitError> {
        let SubmitRequest {
            kind,
            target,
            source,
            params,
        } = request;
        // An empty source part is treated as no source at all.
        let source = source.filter(|s| !s.is_empty());

        let (config, target_media, source_media) =
            match self.validate(kind, &target, source.as_ref(), &params).await {
                Ok(validated) => validated,
                Err(e) => {
                    metrics::JOBS_REJECTED
                        .with_label_values(&[rejection_reason(&e)])
                        .inc();
                    debug!("Rejected {} submission: {}", kind, e);
                    return Err(e.into());
                }
            };

        let job_id = uuid::Uuid::new_v4().to_string();
        let mut inputs = StagedFiles::new();
        let mut output = StagedFiles::new();

        let target_path = self.staging.reserve(target_media.extension);
        inputs.track(&target_path);
        let source_path = source_media.map(|media| {
            let path = self.staging.reserve(media.extension);
            inputs.track(&path);
            path
        });
        let output_path = self
            .staging
            .allocate_output_path(kind, Some(target_media.extension));
        output.track(&output_path);

        let new_job = NewJob {
            job_id: job_id.clone(),
            kind,
            target_path: path_string(&target_path),
            source_paths: source_path.iter().map(|p| path_string(p)).collect(),
            reserved_output_path: path_string(&output_path),
        };
        if let Err(e) = self.store.create(new_job) {
            error!("Failed to record job {}: {}", job_id, e);
            return Err(SubmitError::unavailable(
                None,
                format!("could not record job: {}", e),
            ));
        }
        metrics::JOBS_SUBMITTED
            .with_label_values(&[kind.as_str()])
            .inc();
        info!(
            "Admitted {} job {} (target {})",
            kind,
            job_id,
            target.file_name.as_deref().unwrap_or("<unnamed>")
        );

        let mut writes = vec![(&target_path, &target.bytes)];
        if let (Some(path), Some(upload)) = (&source_path, &source) {
            writes.push((path, &upload.bytes));
        }
        for (path, bytes) in writes {
            if let Err(e) = self.staging.write(path, bytes).await {
                let reason = format!("failed to stage upload: {}", e);
                error!("Job {}: {}", job_id, reason);
                record_failure(self.store.as_ref(), &job_id, &reason);
                inputs.release().await;
                output.release().await;
                return Err(SubmitError::unavailable(Some(&job_id), reason));
            }
        }

        if let Err(e) = transition(self.store.as_ref(), &job_id, JobStatus::Queued, None, None) {
            let reason = format!("could not queue job: {}", e);
            error!("Job {}: {}", job_id, reason);
            record_failure(self.store.as_ref(), &job_id, &reason);
            inputs.release().await;
            output.release().await;
            return Err(SubmitError::unavailable(Some(&job_id), reason));
        }

        let execution = Execution {
            store: Arc::clone(&self.store),
            engine: Arc::clone(&self.engine),
            request: EngineRequest {
                job_id: job_id.clone(),
                kind,
                config: Arc::new(config),
                target_path,
                source_paths: source_path.into_iter().collect(),
                output_path,
            },
            inputs,
            output,
            in_flight: InFlight::enter(&self.active),
        };
        tokio::spawn(execution.run());

        Ok(Admission {
            job_id,
            status: JobStatus::Queued,
        })
    }

    async fn validate(
        &self,
        kind: JobKind,
        target: &Upload,
        source: Option<&Upload>,
        params: &RawProcessRequest,
    ) -> Result<(ProcessingConfig, SniffedMedia, Option<SniffedMedia>), NormalizeError> {
        let target_media = validate_upload(InputRole::Target, kind, &target.bytes)?;

        let capabilities = self.engine.capabilities().await;
        let normalizer = RequestNormalizer::new(&capabilities.providers);
        let config = normalizer.normalize(params, source.is_some())?;

        let source_media = source
            .map(|s| validate_upload(InputRole::Source, JobKind::Image, &s.bytes))
            .transpose()?;

        Ok((config, target_media, source_media))
    }

    /// Get a job by id.
    pub fn get(&self, job_id: &str) -> Result<Option<Job>, JobError> {
        self.store.get(job_id)
    }

    /// Most recent jobs first; `limit` is clamped into the allowed range.
    pub fn list(&self, limit: Option<usize>) -> Result<Vec<Job>, JobError> {
        self.store.list(clamp_list_limit(limit))
    }

    /// Get current orchestrator status.
    pub fn status(&self) -> OrchestratorStatus {
        let count = |status| self.store.count(Some(status)).unwrap_or(0) as usize;

        OrchestratorStatus {
            active_executions: self.active.load(Ordering::Relaxed),
            submitted_count: count(JobStatus::Submitted),
            queued_count: count(JobStatus::Queued),
            running_count: count(JobStatus::Running),
            completed_count: count(JobStatus::Completed),
            failed_count: count(JobStatus::Failed),
        }
    }
}

/// Everything one background execution owns.
struct Execution {
    store: Arc<dyn JobStore>,
    engine: Arc<dyn ProcessingEngine>,
    request: EngineRequest,
    inputs: StagedFiles,
    output: StagedFiles,
    in_flight: InFlight,
}

impl Execution {
    async fn run(self) {
        let Execution {
            store,
            engine,
            request,
            inputs,
            output,
            in_flight: _in_flight,
        } = self;
        let job_id = request.job_id.clone();
        let output_path = request.output_path.clone();

        if let Err(e) = transition(store.as_ref(), &job_id, JobStatus::Running, None, None) {
            error!("Job {} could not start: {}", job_id, e);
            inputs.release().await;
            output.release().await;
            record_failure(store.as_ref(), &job_id, &format!("could not start: {}", e));
            return;
        }
        info!("Job {} running on engine {}", job_id, engine.name());

        let started = Instant::now();
        metrics::JOBS_RUNNING.inc();
        let result = AssertUnwindSafe(engine.process(request))
            .catch_unwind()
            .await;
        metrics::JOBS_RUNNING.dec();

        let verdict = match result {
            Ok(Ok(_)) => verify_output(&output_path).await,
            Ok(Err(e)) => Err(e.job_message()),
            Err(panic) => Err(format!("engine panicked: {}", panic_message(panic.as_ref()))),
        };

        inputs.release().await;

        let elapsed = started.elapsed().as_secs_f64();
        match verdict {
            Ok(()) => {
                let stored = path_string(&output_path);
                match transition(
                    store.as_ref(),
                    &job_id,
                    JobStatus::Completed,
                    Some(&stored),
                    None,
                ) {
                    Ok(_) => {
                        output.keep();
                        metrics::JOB_DURATION
                            .with_label_values(&["completed"])
                            .observe(elapsed);
                        info!("Job {} completed in {:.1}s", job_id, elapsed);
                    }
                    Err(e) => {
                        error!("Job {} could not be marked completed: {}", job_id, e);
                        output.release().await;
                        record_failure(
                            store.as_ref(),
                            &job_id,
                            &format!("could not record completion: {}", e),
                        );
                        metrics::JOB_DURATION
                            .with_label_values(&["failed"])
                            .observe(elapsed);
                    }
                }
            }
            Err(reason) => {
                warn!("Job {} failed after {:.1}s: {}", job_id, elapsed, reason);
                output.release().await;
                record_failure(store.as_ref(), &job_id, &reason);
                metrics::JOB_DURATION
                    .with_label_values(&["failed"])
                    .observe(elapsed);
            }
        }
    }
}

/// Counts an execution from dispatch until its task ends, however it ends.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn transition(
    store: &dyn JobStore,
    job_id: &str,
    status: JobStatus,
    output_path: Option<&str>,
    error: Option<&str>,
) -> Result<Job, JobError> {
    let job = store.update_status(job_id, status, output_path, error)?;
    metrics::JOB_TRANSITIONS
        .with_label_values(&[status.as_str()])
        .inc();
    debug!("Job {} is now {}", job_id, status);
    Ok(job)
}

fn record_failure(store: &dyn JobStore, job_id: &str, reason: &str) {
    if let Err(e) = transition(store, job_id, JobStatus::Failed, None, Some(reason)) {
        error!("Failed to mark job {} as failed: {}", job_id, e);
    }
}

async fn verify_output(path: &Path) -> Result<(), String> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err("engine produced an empty output file".to_string()),
        Err(_) => Err("engine produced no output file".to_string()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn rejection_reason(error: &NormalizeError) -> &'static str {
    match error {
        NormalizeError::MissingParameter(_) => "missing_parameter",
        NormalizeError::ContentMismatch { .. } => "content_mismatch",
        NormalizeError::MissingSource { .. } => "missing_source",
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;
    use crate::job::SqliteJobStore;
    use crate::testing::{fixtures, MockEngine, MockOutput};
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Harness {
        orchestrator: JobOrchestrator,
        engine: Arc<MockEngine>,
        _temp: TempDir,
    }

    async fn harness() -> Harness {
        let temp = TempDir::new().unwrap();
        let staging = FileStaging::new(temp.path().join("uploads"), temp.path().join("outputs"));
        staging.ensure_dirs().await.unwrap();
        let engine = Arc::new(MockEngine::new());
        let store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::in_memory().unwrap());
        Harness {
            orchestrator: JobOrchestrator::new(store, staging, engine.clone()),
            engine,
            _temp: temp,
        }
    }

    async fn wait_terminal(orchestrator: &JobOrchestrator, job_id: &str) -> Job {
        for _ in 0..200 {
            let job = orchestrator.get(job_id).unwrap().unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never reached a terminal state", job_id);
    }

    fn image_request() -> SubmitRequest {
        SubmitRequest::new(JobKind::Image, Upload::new(fixtures::PNG_BYTES))
            .with_source(Upload::new(fixtures::JPEG_BYTES))
    }

    fn dir_is_empty(path: &Path) -> bool {
        std::fs::read_dir(path).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_submit_and_complete() {
        let h = harness().await;

        let admission = h.orchestrator.submit(image_request()).await.unwrap();
        assert_eq!(admission.status, JobStatus::Queued);

        let job = wait_terminal(&h.orchestrator, &admission.job_id).await;
        assert_eq!(job.status, JobStatus::Completed);
        let output = job.output_path.clone().unwrap();
        assert!(output.ends_with(".png"));
        assert_eq!(std::fs::read(&output).unwrap(), fixtures::PNG_BYTES);
        assert!(job.error_message.is_none());
        assert!(dir_is_empty(h.orchestrator.staging().upload_dir()));
    }

    #[tokio::test]
    async fn test_missing_source_rejected_without_job() {
        let h = harness().await;
        let request = SubmitRequest::new(JobKind::Image, Upload::new(fixtures::PNG_BYTES));

        let err = h.orchestrator.submit(request).await.unwrap_err();

        assert!(matches!(
            err,
            SubmitError::BadInput(NormalizeError::MissingSource { .. })
        ));
        assert!(h.orchestrator.list(None).unwrap().is_empty());
        assert_eq!(h.engine.run_count().await, 0);
    }

    #[tokio::test]
    async fn test_processor_without_source_requirement() {
        let h = harness().await;
        let params = RawProcessRequest {
            processors: Some(json!("face_enhancer")),
            ..Default::default()
        };
        let request = SubmitRequest::new(JobKind::Image, Upload::new(fixtures::PNG_BYTES))
            .with_params(params);

        let admission = h.orchestrator.submit(request).await.unwrap();
        let job = wait_terminal(&h.orchestrator, &admission.job_id).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.source_paths.is_empty());
    }

    #[tokio::test]
    async fn test_target_kind_mismatch_rejected() {
        let h = harness().await;
        let request = SubmitRequest::new(JobKind::Video, Upload::new(fixtures::PNG_BYTES));

        let err = h.orchestrator.submit(request).await.unwrap_err();
        assert!(matches!(
            err,
            SubmitError::BadInput(NormalizeError::ContentMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_source_must_be_image() {
        let h = harness().await;
        let request = SubmitRequest::new(JobKind::Image, Upload::new(fixtures::PNG_BYTES))
            .with_source(Upload::new(fixtures::MP4_BYTES));

        let err = h.orchestrator.submit(request).await.unwrap_err();
        assert!(matches!(
            err,
            SubmitError::BadInput(NormalizeError::ContentMismatch {
                role: InputRole::Source,
                ..
            })
        ));
        assert!(dir_is_empty(h.orchestrator.staging().upload_dir()));
    }

    #[tokio::test]
    async fn test_engine_error_fails_job() {
        let h = harness().await;
        h.engine
            .set_next_error(EngineError::process_failed("exit code 1", Some("no face".into())))
            .await;

        let admission = h.orchestrator.submit(image_request()).await.unwrap();
        let job = wait_terminal(&h.orchestrator, &admission.job_id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().contains("no face"));
        assert!(job.output_path.is_none());
        assert!(dir_is_empty(h.orchestrator.staging().upload_dir()));
        assert!(dir_is_empty(h.orchestrator.staging().output_dir()));
    }

    #[tokio::test]
    async fn test_engine_panic_fails_job() {
        let h = harness().await;
        h.engine.set_panic_next().await;

        let admission = h.orchestrator.submit(image_request()).await.unwrap();
        let job = wait_terminal(&h.orchestrator, &admission.job_id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().contains("panicked"));
        assert!(dir_is_empty(h.orchestrator.staging().upload_dir()));
    }

    #[tokio::test]
    async fn test_empty_output_fails_job() {
        let h = harness().await;
        h.engine.set_output(MockOutput::Empty).await;

        let admission = h.orchestrator.submit(image_request()).await.unwrap();
        let job = wait_terminal(&h.orchestrator, &admission.job_id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().contains("empty"));
        assert!(dir_is_empty(h.orchestrator.staging().output_dir()));
    }

    #[tokio::test]
    async fn test_inputs_exist_while_engine_runs() {
        let h = harness().await;

        let admission = h.orchestrator.submit(image_request()).await.unwrap();
        wait_terminal(&h.orchestrator, &admission.job_id).await;

        let recorded = h.engine.recorded_requests().await;
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].inputs_present);
        assert_eq!(recorded[0].request.source_paths.len(), 1);
        assert_eq!(
            recorded[0].request.config.processors,
            vec!["face_swapper".to_string()]
        );
    }

    #[tokio::test]
    async fn test_staging_failure_leaves_failed_row() {
        let h = harness().await;
        std::fs::remove_dir_all(h.orchestrator.staging().upload_dir()).unwrap();

        let err = h.orchestrator.submit(image_request()).await.unwrap_err();

        let job_id = match err {
            SubmitError::Unavailable {
                job_id: Some(id), ..
            } => id,
            other => panic!("unexpected error: {:?}", other),
        };
        let job = h.orchestrator.get(&job_id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().contains("stage"));
        assert_eq!(h.engine.run_count().await, 0);
    }

    #[tokio::test]
    async fn test_status_counts() {
        let h = harness().await;
        h.engine.set_duration(Duration::from_millis(200)).await;

        let admission = h.orchestrator.submit(image_request()).await.unwrap();
        assert_eq!(h.orchestrator.status().active_executions, 1);

        wait_terminal(&h.orchestrator, &admission.job_id).await;
        // The in-flight marker drops right after the terminal write.
        for _ in 0..100 {
            if h.orchestrator.status().active_executions == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let status = h.orchestrator.status();
        assert_eq!(status.active_executions, 0);
        assert_eq!(status.completed_count, 1);
        assert_eq!(status.failed_count, 0);
    }
}
