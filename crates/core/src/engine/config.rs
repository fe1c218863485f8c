//! Configuration for the command-line processing engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How to invoke the external processing program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Program to run.
    #[serde(default = "default_program")]
    pub program: PathBuf,

    /// Arguments placed before the per-job flags.
    #[serde(default = "default_base_args")]
    pub base_args: Vec<String>,

    /// Arguments for the capability probe; its output is searched for provider and processor names.
    #[serde(default = "default_providers_args")]
    pub providers_args: Vec<String>,

    /// Working directory for the program. Inherited when unset.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Timeout for a single job in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum jobs the engine runs at once. 0 means unbounded.
    #[serde(default)]
    pub max_parallel: usize,

    /// Engine log level (error, warn, info, debug).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Additional arguments appended after the per-job flags.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_program() -> PathBuf {
    PathBuf::from("python")
}

fn default_base_args() -> Vec<String> {
    vec!["facefusion.py".to_string(), "headless-run".to_string()]
}

fn default_providers_args() -> Vec<String> {
    vec!["facefusion.py".to_string(), "--help".to_string()]
}

fn default_timeout() -> u64 {
    3600 // 1 hour
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            base_args: default_base_args(),
            providers_args: default_providers_args(),
            working_dir: None,
            timeout_secs: default_timeout(),
            max_parallel: 0,
            log_level: default_log_level(),
            extra_args: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Creates a config running `program` with no base arguments.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            providers_args: Vec::new(),
            ..Default::default()
        }
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the concurrency limit.
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    /// Sets the base arguments.
    pub fn with_base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the capability probe arguments.
    pub fn with_providers_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.providers_args = args.into_iter().map(Into::into).collect();
        self
    }
}
