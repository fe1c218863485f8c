//! Execution provider and processor detection.

use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use super::config::EngineConfig;
use crate::normalizer::{BASELINE_PROVIDER, KNOWN_PROCESSORS, KNOWN_PROVIDERS};

/// What the installed engine can do on this host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCapabilities {
    /// Execution providers, always including the baseline.
    pub providers: Vec<String>,
    /// Processors the engine advertises.
    pub processors: Vec<String>,
}

impl Default for EngineCapabilities {
    fn default() -> Self {
        Self::baseline()
    }
}

impl EngineCapabilities {
    /// The baseline provider and no known processors.
    pub fn baseline() -> Self {
        Self {
            providers: vec![BASELINE_PROVIDER.to_string()],
            processors: Vec::new(),
        }
    }

    /// Every known provider and processor. Used by fakes and tests.
    pub fn everything() -> Self {
        Self {
            providers: KNOWN_PROVIDERS.iter().map(|p| p.to_string()).collect(),
            processors: KNOWN_PROCESSORS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Detect capabilities by running the engine's probe command.
    ///
    /// Falls back to [`baseline`](Self::baseline) when the probe cannot run.
    pub async fn detect(config: &EngineConfig) -> Self {
        let mut command = Command::new(&config.program);
        command
            .args(&config.providers_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &config.working_dir {
            command.current_dir(dir);
        }

        let text = match command.output().await {
            Ok(o) if o.status.success() => {
                let mut text = String::from_utf8_lossy(&o.stdout).to_string();
                text.push_str(&String::from_utf8_lossy(&o.stderr));
                text
            }
            Ok(o) => {
                warn!(
                    "Engine probe exited with code {:?}, assuming baseline capabilities",
                    o.status.code()
                );
                return Self::baseline();
            }
            Err(e) => {
                warn!(
                    "Engine probe {} failed: {}, assuming baseline capabilities",
                    config.program.display(),
                    e
                );
                return Self::baseline();
            }
        };

        let caps = Self::from_probe_output(&text);
        debug!(
            "Detected providers {:?} and processors {:?}",
            caps.providers, caps.processors
        );
        caps
    }

    /// Extract capabilities from probe output text.
    pub fn from_probe_output(text: &str) -> Self {
        let mut providers: Vec<String> = KNOWN_PROVIDERS
            .iter()
            .filter(|p| **p != BASELINE_PROVIDER && text.contains(*p))
            .map(|p| p.to_string())
            .collect();
        providers.push(BASELINE_PROVIDER.to_string());

        let processors = KNOWN_PROCESSORS
            .iter()
            .filter(|p| text.contains(*p))
            .map(|p| p.to_string())
            .collect();

        Self {
            providers,
            processors,
        }
    }

    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.iter().any(|p| p == name)
    }

    pub fn has_processor(&self, name: &str) -> bool {
        self.processors.iter().any(|p| p == name)
    }
}
