//! Turns raw client parameters into a [`ProcessingConfig`].

use serde_json::Value;
use tracing::{debug, warn};

use super::content::{sniff, SniffedMedia};
use super::error::{InputRole, NormalizeError};
use super::parse::{clamp_float, clamp_int, parse_float, parse_list, percent_to_factor};
use super::types::*;
use crate::job::JobKind;

/// Normalizes requests against the providers discovered at start-up.
#[derive(Debug, Clone)]
pub struct RequestNormalizer {
    available_providers: Vec<String>,
}

impl RequestNormalizer {
    /// Create a normalizer. The baseline provider is always considered available.
    pub fn new<I, S>(available_providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut providers: Vec<String> = Vec::new();
        for provider in available_providers {
            let provider = provider.as_ref().trim().to_ascii_lowercase();
            if !provider.is_empty() && !providers.contains(&provider) {
                providers.push(provider);
            }
        }
        if !providers.iter().any(|p| p == BASELINE_PROVIDER) {
            providers.push(BASELINE_PROVIDER.to_string());
        }
        Self {
            available_providers: providers,
        }
    }

    pub fn available_providers(&self) -> &[String] {
        &self.available_providers
    }

    /// Build the canonical configuration.
    ///
    /// Fails only when a source-requiring processor is selected and
    /// `has_source` is false; every other oddity falls back to a default.
    pub fn normalize(
        &self,
        raw: &RawProcessRequest,
        has_source: bool,
    ) -> Result<ProcessingConfig, NormalizeError> {
        let config = ProcessingConfig {
            processors: self.processors(raw.processors.as_ref()),
            execution_providers: self.providers(raw.execution_providers.as_ref()),
            execution_thread_count: clamp_int(
                raw.execution_thread_count.as_ref(),
                THREAD_COUNT_RANGE.0,
                THREAD_COUNT_RANGE.1,
                DEFAULT_THREAD_COUNT,
            ) as u32,
            output_image_scale: scale_factor(raw.output_image_scale.as_ref()),
            output_video_scale: scale_factor(raw.output_video_scale.as_ref()),
            output_video_fps: video_fps(raw.output_video_fps.as_ref()),
            face_detector_model: detector_model(raw.face_detector_model.as_ref()),
            face_detector_score: clamp_float(
                raw.face_detector_score.as_ref(),
                DETECTOR_SCORE_RANGE.0,
                DETECTOR_SCORE_RANGE.1,
                DEFAULT_DETECTOR_SCORE,
            ),
        };

        let needs_source = config.source_required_processors();
        if !has_source && !needs_source.is_empty() {
            return Err(NormalizeError::MissingSource {
                processors: needs_source,
            });
        }

        debug!(?config, "Normalized processing request");
        Ok(config)
    }

    fn processors(&self, value: Option<&Value>) -> Vec<String> {
        let requested = value.map(parse_list).unwrap_or_default();
        let (known, unknown): (Vec<_>, Vec<_>) = requested
            .into_iter()
            .partition(|p| KNOWN_PROCESSORS.contains(&p.as_str()));

        if !unknown.is_empty() {
            warn!("Ignoring unknown processors: {}", unknown.join(", "));
        }
        if known.is_empty() {
            return vec![DEFAULT_PROCESSOR.to_string()];
        }
        known
    }

    fn providers(&self, value: Option<&Value>) -> Vec<String> {
        let requested = value.map(parse_list).unwrap_or_default();
        let (mut usable, dropped): (Vec<_>, Vec<_>) = requested
            .into_iter()
            .partition(|p| self.available_providers.contains(p));

        if !dropped.is_empty() {
            warn!(
                "Execution providers not available, dropping: {} (available: {})",
                dropped.join(", "),
                self.available_providers.join(", ")
            );
        }
        if !usable.iter().any(|p| p == BASELINE_PROVIDER) {
            usable.push(BASELINE_PROVIDER.to_string());
        }
        usable
    }
}

fn scale_factor(value: Option<&Value>) -> f64 {
    let percent = clamp_int(
        value,
        SCALE_PERCENT_RANGE.0,
        SCALE_PERCENT_RANGE.1,
        DEFAULT_SCALE_PERCENT,
    );
    percent_to_factor(percent)
}

fn video_fps(value: Option<&Value>) -> Option<f64> {
    let value = value.filter(|v| !is_blank(v))?;
    match parse_float(value) {
        Some(fps) => Some(fps.clamp(VIDEO_FPS_RANGE.0, VIDEO_FPS_RANGE.1)),
        None => {
            warn!("Ignoring unparseable output_video_fps: {}", value);
            None
        }
    }
}

fn detector_model(value: Option<&Value>) -> FaceDetectorModel {
    let Some(value) = value.filter(|v| !is_blank(v)) else {
        return FaceDetectorModel::default();
    };
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    text.parse().unwrap_or_else(|e| {
        warn!("{}, using {}", e, FaceDetectorModel::default());
        FaceDetectorModel::default()
    })
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Check that an upload is present and that its bytes are the `expected` kind.
pub fn validate_upload(
    role: InputRole,
    expected: JobKind,
    bytes: &[u8],
) -> Result<SniffedMedia, NormalizeError> {
    if bytes.is_empty() {
        return Err(NormalizeError::MissingParameter(role.as_str().to_string()));
    }

    match sniff(bytes) {
        Some(media) if media.kind == expected => Ok(media),
        detected => Err(NormalizeError::ContentMismatch {
            role,
            expected,
            detected: detected.map(|m| m.kind),
        }),
    }
}
