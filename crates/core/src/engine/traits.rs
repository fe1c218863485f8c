//! Trait definitions for the engine module.

use async_trait::async_trait;

use super::capabilities::EngineCapabilities;
use super::error::EngineError;
use super::types::{EngineOutcome, EngineRequest};

/// Something that turns staged inputs into an output artifact.
///
/// Implementations must write exactly to `request.output_path` and must not
/// touch the input files.
#[async_trait]
pub trait ProcessingEngine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Providers and processors available on this host.
    async fn capabilities(&self) -> EngineCapabilities;

    /// Runs one job to completion.
    async fn process(&self, request: EngineRequest) -> Result<EngineOutcome, EngineError>;

    /// Validates that the engine is properly configured and ready.
    async fn validate(&self) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobKind;
    use crate::normalizer::ProcessingConfig;
    use std::path::PathBuf;
    use std::sync::Arc;

    struct EchoEngine;

    #[async_trait]
    impl ProcessingEngine for EchoEngine {
        fn name(&self) -> &str {
            "echo"
        }

        async fn capabilities(&self) -> EngineCapabilities {
            EngineCapabilities::baseline()
        }

        async fn process(&self, request: EngineRequest) -> Result<EngineOutcome, EngineError> {
            Ok(EngineOutcome {
                job_id: request.job_id,
                output_path: request.output_path,
                output_size_bytes: 0,
                duration_ms: 0,
            })
        }

        async fn validate(&self) -> Result<(), EngineError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_engine_as_trait_object() {
        let engine: Arc<dyn ProcessingEngine> = Arc::new(EchoEngine);
        let outcome = engine
            .process(EngineRequest {
                job_id: "job-1".to_string(),
                kind: JobKind::Image,
                config: Arc::new(ProcessingConfig::default()),
                target_path: PathBuf::from("/in/target.png"),
                source_paths: vec![],
                output_path: PathBuf::from("/out/result.png"),
            })
            .await
            .unwrap();

        assert_eq!(engine.name(), "echo");
        assert_eq!(outcome.job_id, "job-1");
        assert_eq!(outcome.output_path, PathBuf::from("/out/result.png"));
    }
}
