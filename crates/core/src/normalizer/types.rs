//! Raw and canonical processing parameters.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Processors the engine knows how to run.
pub const KNOWN_PROCESSORS: &[&str] = &[
    "age_modifier",
    "deep_swapper",
    "expression_restorer",
    "face_debugger",
    "face_editor",
    "face_enhancer",
    "face_swapper",
    "frame_colorizer",
    "frame_enhancer",
    "lip_syncer",
];

/// Used when a request names no usable processor.
pub const DEFAULT_PROCESSOR: &str = "face_swapper";

/// Processors that cannot run without a source image.
pub const SOURCE_REQUIRED_PROCESSORS: &[&str] = &["face_swapper"];

/// Always available, always appended.
pub const BASELINE_PROVIDER: &str = "cpu";

/// Provider names the engine may report.
pub const KNOWN_PROVIDERS: &[&str] = &[
    "cpu", "cuda", "tensorrt", "rocm", "directml", "openvino", "coreml",
];

pub const THREAD_COUNT_RANGE: (i64, i64) = (1, 32);
pub const DEFAULT_THREAD_COUNT: i64 = 1;
pub const SCALE_PERCENT_RANGE: (i64, i64) = (10, 400);
pub const DEFAULT_SCALE_PERCENT: i64 = 100;
pub const VIDEO_FPS_RANGE: (f64, f64) = (1.0, 240.0);
pub const DETECTOR_SCORE_RANGE: (f64, f64) = (0.0, 1.0);
pub const DEFAULT_DETECTOR_SCORE: f64 = 0.5;

/// Parameters exactly as the client sent them.
///
/// Every field is optional and loosely typed; see [`super::parse`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProcessRequest {
    pub processors: Option<Value>,
    pub execution_providers: Option<Value>,
    pub execution_thread_count: Option<Value>,
    pub output_image_scale: Option<Value>,
    pub output_video_scale: Option<Value>,
    pub output_video_fps: Option<Value>,
    pub face_detector_model: Option<Value>,
    pub face_detector_score: Option<Value>,
}

impl RawProcessRequest {
    /// Store a text form field under its parameter name.
    ///
    /// Returns `false` for names that are not processing parameters.
    pub fn set_field(&mut self, name: &str, text: String) -> bool {
        let slot = match name {
            "processors" => &mut self.processors,
            "execution_providers" => &mut self.execution_providers,
            "execution_thread_count" => &mut self.execution_thread_count,
            "output_image_scale" => &mut self.output_image_scale,
            "output_video_scale" => &mut self.output_video_scale,
            "output_video_fps" => &mut self.output_video_fps,
            "face_detector_model" => &mut self.face_detector_model,
            "face_detector_score" => &mut self.face_detector_score,
            _ => return false,
        };
        *slot = Some(Value::String(text));
        true
    }
}

/// Face detector families the engine ships.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceDetectorModel {
    Many,
    Retinaface,
    Scrfd,
    #[default]
    Yoloface,
}

impl FaceDetectorModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaceDetectorModel::Many => "many",
            FaceDetectorModel::Retinaface => "retinaface",
            FaceDetectorModel::Scrfd => "scrfd",
            FaceDetectorModel::Yoloface => "yoloface",
        }
    }
}

impl fmt::Display for FaceDetectorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaceDetectorModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "many" => Ok(FaceDetectorModel::Many),
            "retinaface" => Ok(FaceDetectorModel::Retinaface),
            "scrfd" => Ok(FaceDetectorModel::Scrfd),
            // Older clients send the weight file name.
            "yoloface" | "yolo_face" | "yoloface_8n" => Ok(FaceDetectorModel::Yoloface),
            other => Err(format!("unknown face detector model: {}", other)),
        }
    }
}

/// Canonical, bounds-checked parameters for one job.
///
/// Built once at admission and shared read-only with the execution task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingConfig {
    pub processors: Vec<String>,
    pub execution_providers: Vec<String>,
    pub execution_thread_count: u32,
    /// Multiplicative factor, `output_image_scale / 100`.
    pub output_image_scale: f64,
    /// Multiplicative factor, `output_video_scale / 100`.
    pub output_video_scale: f64,
    /// `None` keeps the source frame rate.
    pub output_video_fps: Option<f64>,
    pub face_detector_model: FaceDetectorModel,
    pub face_detector_score: f64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            processors: vec![DEFAULT_PROCESSOR.to_string()],
            execution_providers: vec![BASELINE_PROVIDER.to_string()],
            execution_thread_count: DEFAULT_THREAD_COUNT as u32,
            output_image_scale: 1.0,
            output_video_scale: 1.0,
            output_video_fps: None,
            face_detector_model: FaceDetectorModel::default(),
            face_detector_score: DEFAULT_DETECTOR_SCORE,
        }
    }
}

impl ProcessingConfig {
    /// Processors in this config that need a source image.
    pub fn source_required_processors(&self) -> Vec<String> {
        self.processors
            .iter()
            .filter(|p| SOURCE_REQUIRED_PROCESSORS.contains(&p.as_str()))
            .cloned()
            .collect()
    }
}
