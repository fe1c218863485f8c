//! Engine that runs an external command-line program per job.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{OnceCell, Semaphore};
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

use super::capabilities::EngineCapabilities;
use super::config::EngineConfig;
use super::error::EngineError;
use super::traits::ProcessingEngine;
use super::types::{EngineOutcome, EngineRequest};
use crate::job::JobKind;

/// Stderr lines kept for the failure message.
const STDERR_TAIL_LINES: usize = 20;

/// Runs the configured program once per job with the job's flags.
pub struct CommandEngine {
    config: EngineConfig,
    capabilities: OnceCell<EngineCapabilities>,
    permits: Option<Arc<Semaphore>>,
}

impl CommandEngine {
    /// Creates a new engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        let permits = (config.max_parallel > 0)
            .then(|| Arc::new(Semaphore::new(config.max_parallel)));
        Self {
            config,
            capabilities: OnceCell::new(),
            permits,
        }
    }

    /// Creates an engine with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    /// Builds the argument list for one job.
    fn build_args(&self, request: &EngineRequest) -> Vec<String> {
        let config = &request.config;
        let mut args = self.config.base_args.clone();

        args.push("--processors".to_string());
        args.extend(config.processors.iter().cloned());

        args.push("--execution-providers".to_string());
        args.extend(config.execution_providers.iter().cloned());

        args.extend([
            "--execution-thread-count".to_string(),
            config.execution_thread_count.to_string(),
        ]);

        args.extend(["-t".to_string(), request.target_path.to_string_lossy().to_string()]);

        if !request.source_paths.is_empty() {
            args.push("-s".to_string());
            args.extend(
                request
                    .source_paths
                    .iter()
                    .map(|p| p.to_string_lossy().to_string()),
            );
        }

        args.extend(["-o".to_string(), request.output_path.to_string_lossy().to_string()]);

        args.extend([
            "--face-detector-model".to_string(),
            config.face_detector_model.as_str().to_string(),
            "--face-detector-score".to_string(),
            config.face_detector_score.to_string(),
        ]);

        match request.kind {
            JobKind::Image => {
                args.extend([
                    "--output-image-scale".to_string(),
                    config.output_image_scale.to_string(),
                ]);
            }
            JobKind::Video => {
                args.extend([
                    "--output-video-scale".to_string(),
                    config.output_video_scale.to_string(),
                ]);
                if let Some(fps) = config.output_video_fps {
                    args.extend(["--output-video-fps".to_string(), fps.to_string()]);
                }
            }
        }

        args.extend(["--log-level".to_string(), self.config.log_level.clone()]);
        args.extend(self.config.extra_args.iter().cloned());

        args
    }

    fn spawn_error(&self, e: std::io::Error) -> EngineError {
        if e.kind() == std::io::ErrorKind::NotFound {
            EngineError::ProgramNotFound {
                path: self.config.program.clone(),
            }
        } else {
            EngineError::Io(e)
        }
    }

    async fn run(&self, request: &EngineRequest) -> Result<EngineOutcome, EngineError> {
        let start = Instant::now();

        // Ensure output directory exists
        if let Some(parent) = request.output_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|_| EngineError::OutputDirectoryFailed {
                    path: parent.to_path_buf(),
                })?;
        }

        for input in std::iter::once(&request.target_path).chain(request.source_paths.iter()) {
            if tokio::fs::metadata(input).await.is_err() {
                return Err(EngineError::InputNotFound {
                    path: input.clone(),
                });
            }
        }

        let args = self.build_args(request);
        debug!("Running {} {:?}", self.config.program.display(), args);

        let mut command = Command::new(&self.config.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| self.spawn_error(e))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::process_failed("stderr was not captured", None))?;
        let mut reader = BufReader::new(stderr).lines();

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

            while let Ok(Some(line)) = reader.next_line().await {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }

            let status = child.wait().await?;
            let tail: Vec<String> = tail.into_iter().collect();
            Ok::<(std::process::ExitStatus, String), std::io::Error>((status, tail.join("\n")))
        })
        .await;

        match result {
            Ok(Ok((status, stderr_tail))) => {
                if !status.success() {
                    return Err(EngineError::process_failed(
                        format!("engine exited with code: {:?}", status.code()),
                        if stderr_tail.is_empty() {
                            None
                        } else {
                            Some(stderr_tail)
                        },
                    ));
                }
            }
            Ok(Err(e)) => return Err(EngineError::Io(e)),
            Err(_) => {
                let _ = child.kill().await;
                return Err(EngineError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
        }

        let output_meta = tokio::fs::metadata(&request.output_path)
            .await
            .map_err(|_| EngineError::process_failed("output file not created", None))?;

        Ok(EngineOutcome {
            job_id: request.job_id.clone(),
            output_path: request.output_path.clone(),
            output_size_bytes: output_meta.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[async_trait]
impl ProcessingEngine for CommandEngine {
    fn name(&self) -> &str {
        "command"
    }

    async fn capabilities(&self) -> EngineCapabilities {
        self.capabilities
            .get_or_init(|| EngineCapabilities::detect(&self.config))
            .await
            .clone()
    }

    async fn process(&self, request: EngineRequest) -> Result<EngineOutcome, EngineError> {
        let _permit = match &self.permits {
            Some(permits) => Some(permits.acquire().await.map_err(|_| {
                EngineError::Unavailable {
                    reason: "engine is shutting down".to_string(),
                }
            })?),
            None => None,
        };

        let outcome = self.run(&request).await?;
        info!(
            "Engine finished job {} in {}ms ({} bytes)",
            outcome.job_id, outcome.duration_ms, outcome.output_size_bytes
        );
        Ok(outcome)
    }

    async fn validate(&self) -> Result<(), EngineError> {
        let mut command = Command::new(&self.config.program);
        command
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        command.status().await.map_err(|e| self.spawn_error(e))?;
        Ok(())
    }
}
