//! Processing engine seam.
//!
//! The orchestrator only sees [`ProcessingEngine`]. [`CommandEngine`] runs an
//! external program per job; tests use `testing::MockEngine`.

mod capabilities;
mod command;
mod config;
mod error;
mod traits;
mod types;

pub use capabilities::EngineCapabilities;
pub use command::CommandEngine;
pub use config::EngineConfig;
pub use error::EngineError;
pub use traits::ProcessingEngine;
pub use types::{EngineOutcome, EngineRequest};
