//! Job orchestrator: admission and background execution.
//!
//! The orchestrator drives jobs through the state machine:
//! - **Admission**: synchronous, inside the submit call (validate, record, stage, queue)
//! - **Execution**: one tokio task per job (run the engine, verify, finish, clean up)

mod runner;
mod types;

pub use runner::JobOrchestrator;
pub use types::{Admission, OrchestratorStatus, SubmitError, SubmitRequest, Upload};
