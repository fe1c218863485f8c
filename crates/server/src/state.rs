use chrono::{DateTime, Utc};
use mediajob_core::{Config, JobOrchestrator, OutputRetrieval, ProcessingEngine, SanitizedConfig};
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<JobOrchestrator>,
    retrieval: OutputRetrieval,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Arc<JobOrchestrator>) -> Self {
        let retrieval = OutputRetrieval::new(orchestrator.staging().clone());
        Self {
            config,
            orchestrator,
            retrieval,
            started_at: Utc::now(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &JobOrchestrator {
        &self.orchestrator
    }

    pub fn retrieval(&self) -> &OutputRetrieval {
        &self.retrieval
    }

    pub fn engine(&self) -> &dyn ProcessingEngine {
        self.orchestrator.engine().as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
