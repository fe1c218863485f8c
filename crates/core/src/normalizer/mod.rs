//! Request normalization and upload validation.
//!
//! Clients send parameters in whatever shape their form library produces:
//! lists as JSON text or comma separated strings, numbers as strings. The
//! normalizer turns them into one immutable [`ProcessingConfig`] per job,
//! clamping every numeric field into its documented range and falling back to
//! defaults instead of failing. The only hard parameter rejection is a
//! source-requiring processor without a source upload.
//!
//! Upload validation looks at content, not file names: a PNG renamed to
//! `.mp4` is still an image.

mod content;
mod error;
mod parse;
mod request;
mod types;

pub use content::{sanitize_extension, sniff, SniffedMedia};
pub use error::{InputRole, NormalizeError};
pub use request::{validate_upload, RequestNormalizer};
pub use types::{
    FaceDetectorModel, ProcessingConfig, RawProcessRequest, BASELINE_PROVIDER, DEFAULT_PROCESSOR,
    KNOWN_PROCESSORS, KNOWN_PROVIDERS, SOURCE_REQUIRED_PROCESSORS,
};
