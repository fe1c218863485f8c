pub mod config;
pub mod engine;
pub mod job;
pub mod metrics;
pub mod normalizer;
pub mod orchestrator;
pub mod retrieval;
pub mod staging;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    SanitizedConfig, ServerConfig, StorageConfig,
};
pub use engine::{
    CommandEngine, EngineCapabilities, EngineConfig, EngineError, EngineOutcome, EngineRequest,
    ProcessingEngine,
};
pub use job::{Job, JobError, JobKind, JobStatus, JobStore, NewJob, SqliteJobStore};
pub use normalizer::{
    FaceDetectorModel, InputRole, NormalizeError, ProcessingConfig, RawProcessRequest,
    RequestNormalizer, KNOWN_PROCESSORS,
};
pub use orchestrator::{
    Admission, JobOrchestrator, OrchestratorStatus, SubmitError, SubmitRequest, Upload,
};
pub use retrieval::{Artifact, Deleted, OutputRetrieval, RetrievalError};
pub use staging::{FileStaging, StagedFiles, StagingError};
