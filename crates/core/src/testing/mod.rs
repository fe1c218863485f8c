//! Testing utilities and a mock engine for end-to-end tests.
//!
//! Lets the orchestrator and the HTTP layer run without the external
//! processing program installed.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediajob_core::testing::{fixtures, MockEngine};
//!
//! let engine = Arc::new(MockEngine::new());
//! engine.set_duration(Duration::from_millis(200)).await;
//!
//! // Submit fixtures::PNG_BYTES as the target...
//! ```

mod mock_engine;

pub use mock_engine::{MockEngine, MockOutput, RecordedRequest};

/// Small media files that pass content detection.
pub mod fixtures {
    /// A 1x1 transparent PNG.
    pub const PNG_BYTES: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    /// A JFIF header followed by end-of-image.
    pub const JPEG_BYTES: &[u8] = &[
        0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01, 0x01, 0x00, 0x00,
        0x01, 0x00, 0x01, 0x00, 0x00, 0xFF, 0xD9,
    ];

    /// An `ftyp` box with the `isom` brand followed by an empty `mdat`.
    pub const MP4_BYTES: &[u8] = &[
        0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm', 0x00, 0x00, 0x02,
        0x00, b'i', b's', b'o', b'm', b'i', b's', b'o', b'2', 0x00, 0x00, 0x00, 0x08, b'm', b'd',
        b'a', b't',
    ];

    /// Bytes that match no supported container.
    pub const TEXT_BYTES: &[u8] = b"this is not media";
}
