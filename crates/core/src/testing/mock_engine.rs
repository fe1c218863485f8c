//! Mock processing engine for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::engine::{
    EngineCapabilities, EngineError, EngineOutcome, EngineRequest, ProcessingEngine,
};

/// A recorded engine invocation for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// The request the orchestrator sent.
    pub request: EngineRequest,
    /// Whether every input file existed when the engine started.
    pub inputs_present: bool,
    /// Whether the engine reported success.
    pub success: bool,
}

/// What the mock writes to the output path on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutput {
    /// Copy the target file's bytes.
    CopyTarget,
    /// Write these bytes.
    Bytes(Vec<u8>),
    /// Create an empty file.
    Empty,
    /// Report success without writing anything.
    Missing,
}

/// Mock implementation of the ProcessingEngine trait.
///
/// Provides controllable behavior for testing:
/// - Track engine requests for assertions
/// - Simulate failures, slow runs and panics
/// - Control what lands at the output path
///
/// # Example
///
/// ```rust,ignore
/// use mediajob_core::testing::{MockEngine, MockOutput};
///
/// let engine = MockEngine::new();
/// engine.set_output(MockOutput::Empty).await;
///
/// // ... submit a job through the orchestrator ...
///
/// let requests = engine.recorded_requests().await;
/// assert_eq!(requests.len(), 1);
/// ```
#[derive(Debug)]
pub struct MockEngine {
    /// Recorded requests.
    requests: Arc<RwLock<Vec<RecordedRequest>>>,
    /// If set, the next run will fail with this error.
    next_error: Arc<RwLock<Option<EngineError>>>,
    /// If set, the next run will panic.
    panic_next: Arc<RwLock<bool>>,
    /// Simulated run duration in milliseconds.
    duration_ms: Arc<RwLock<u64>>,
    /// Output behavior on success.
    output: Arc<RwLock<MockOutput>>,
    /// Reported capabilities.
    capabilities: Arc<RwLock<EngineCapabilities>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create a new mock engine that copies the target to the output.
    pub fn new() -> Self {
        Self {
            requests: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            panic_next: Arc::new(RwLock::new(false)),
            duration_ms: Arc::new(RwLock::new(10)),
            output: Arc::new(RwLock::new(MockOutput::CopyTarget)),
            capabilities: Arc::new(RwLock::new(EngineCapabilities::everything())),
        }
    }

    /// Get all recorded requests.
    pub async fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().await.clone()
    }

    /// Get the number of runs performed.
    pub async fn run_count(&self) -> usize {
        self.requests.read().await.len()
    }

    /// Configure the next run to fail with the given error.
    pub async fn set_next_error(&self, error: EngineError) {
        *self.next_error.write().await = Some(error);
    }

    /// Configure the next run to panic.
    pub async fn set_panic_next(&self) {
        *self.panic_next.write().await = true;
    }

    /// Set the simulated run duration.
    pub async fn set_duration(&self, duration: Duration) {
        *self.duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Set what a successful run leaves at the output path.
    pub async fn set_output(&self, output: MockOutput) {
        *self.output.write().await = output;
    }

    /// Set the reported capabilities.
    pub async fn set_capabilities(&self, capabilities: EngineCapabilities) {
        *self.capabilities.write().await = capabilities;
    }

    async fn record(&self, request: &EngineRequest, inputs_present: bool, success: bool) {
        self.requests.write().await.push(RecordedRequest {
            request: request.clone(),
            inputs_present,
            success,
        });
    }

    async fn write_output(&self, request: &EngineRequest) -> Result<u64, EngineError> {
        let output = self.output.read().await.clone();
        let bytes = match output {
            MockOutput::CopyTarget => tokio::fs::read(&request.target_path).await?,
            MockOutput::Bytes(bytes) => bytes,
            MockOutput::Empty => Vec::new(),
            MockOutput::Missing => return Ok(0),
        };
        tokio::fs::write(&request.output_path, &bytes).await?;
        Ok(bytes.len() as u64)
    }
}

#[async_trait]
impl ProcessingEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn capabilities(&self) -> EngineCapabilities {
        self.capabilities.read().await.clone()
    }

    async fn process(&self, request: EngineRequest) -> Result<EngineOutcome, EngineError> {
        let mut inputs_present = tokio::fs::metadata(&request.target_path).await.is_ok();
        for source in &request.source_paths {
            inputs_present &= tokio::fs::metadata(source).await.is_ok();
        }

        let duration_ms = *self.duration_ms.read().await;
        if duration_ms > 0 {
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
        }

        let should_panic = std::mem::take(&mut *self.panic_next.write().await);
        if should_panic {
            self.record(&request, inputs_present, false).await;
            panic!("mock engine panicked on job {}", request.job_id);
        }

        if let Some(err) = self.next_error.write().await.take() {
            self.record(&request, inputs_present, false).await;
            return Err(err);
        }

        let size = match self.write_output(&request).await {
            Ok(size) => size,
            Err(e) => {
                self.record(&request, inputs_present, false).await;
                return Err(e);
            }
        };
        self.record(&request, inputs_present, true).await;

        Ok(EngineOutcome {
            job_id: request.job_id,
            output_path: request.output_path,
            output_size_bytes: size,
            duration_ms,
        })
    }

    async fn validate(&self) -> Result<(), EngineError> {
        Ok(())
    }
}
