//! Common test utilities for API tests with a mock engine.
//!
//! Builds the real router in-process over an in-memory ledger, temp staging
//! directories and a [`MockEngine`], so requests run end to end without the
//! external processing program.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use mediajob_core::testing::MockEngine;
use mediajob_core::{
    Config, FileStaging, JobOrchestrator, JobStore, ProcessingEngine, SqliteJobStore,
    StorageConfig,
};

/// Re-export fixtures for test convenience
pub use mediajob_core::testing::fixtures;

const BOUNDARY: &str = "mediajob-test-boundary";

/// In-process server with a controllable engine.
pub struct TestFixture {
    pub router: Router,
    /// Mock engine - inject errors, delays and outputs
    pub engine: Arc<MockEngine>,
    /// Holds the staging directories alive
    pub temp_dir: TempDir,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    /// Parsed JSON, or `Null` for non-JSON bodies
    pub body: Value,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl TestFixture {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let upload_dir = temp_dir.path().join("uploads");
        let output_dir = temp_dir.path().join("outputs");

        let config = Config {
            storage: StorageConfig {
                upload_dir: upload_dir.clone(),
                output_dir: output_dir.clone(),
            },
            ..Default::default()
        };

        let staging = FileStaging::from_config(&config.storage);
        staging.ensure_dirs().await.expect("Failed to create dirs");

        let store: Arc<dyn JobStore> =
            Arc::new(SqliteJobStore::in_memory().expect("Failed to create job store"));
        let engine = Arc::new(MockEngine::new());
        engine.set_duration(Duration::from_millis(20)).await;

        let orchestrator = Arc::new(JobOrchestrator::new(
            store,
            staging,
            Arc::clone(&engine) as Arc<dyn ProcessingEngine>,
        ));
        let state = Arc::new(mediajob_server::state::AppState::new(config, orchestrator));
        let router = mediajob_server::api::create_router(state);

        Self {
            router,
            engine,
            temp_dir,
            upload_dir,
            output_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Request::builder().method("GET").uri(path).body(Body::empty()).unwrap())
            .await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(path)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Send a multipart POST.
    pub async fn post_form(&self, path: &str, form: MultipartForm) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(form.finish()))
            .unwrap();
        self.send(request).await
    }

    /// Poll a job until it reaches `status` or the timeout elapses.
    pub async fn wait_for_status(&self, job_id: &str, status: &str) -> Value {
        let path = format!("/api/v1/jobs/{}", job_id);
        for _ in 0..200 {
            let response = self.get(&path).await;
            if response.body["status"] == status {
                return response.body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never reached {}", job_id, status);
    }

    /// Names of files currently in the upload staging area.
    pub fn staged_uploads(&self) -> Vec<String> {
        std::fs::read_dir(&self.upload_dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes()
            .to_vec();

        let body: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            body,
            bytes,
            content_type,
        }
    }
}

/// Minimal multipart/form-data encoder.
#[derive(Default)]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, file_name: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.body
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
