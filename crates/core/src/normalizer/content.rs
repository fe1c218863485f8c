//! Media detection from file content.
//!
//! The declared kind of an upload is checked against its leading bytes, never
//! against the client's file name.

use image::ImageFormat;

use crate::job::JobKind;

/// What an upload's bytes turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SniffedMedia {
    pub kind: JobKind,
    /// Canonical extension for the detected container, without the dot.
    pub extension: &'static str,
}

/// Still-image containers accepted as image input.
const ACCEPTED_IMAGE_FORMATS: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::WebP,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
];

/// ISO-BMFF brands that hold still images rather than video.
const STILL_IMAGE_BRANDS: &[&[u8; 4]] = &[b"avif", b"avis", b"heic", b"heix", b"mif1", b"msf1"];

const MPEG_TS_PACKET: usize = 188;
const MPEG_TS_SYNC: u8 = 0x47;
/// Consecutive packets that must start with the sync byte.
const MPEG_TS_MIN_PACKETS: usize = 4;

/// Detect the media kind of `bytes`, if it is a supported image or video.
pub fn sniff(bytes: &[u8]) -> Option<SniffedMedia> {
    sniff_image(bytes).or_else(|| sniff_video(bytes))
}

fn sniff_image(bytes: &[u8]) -> Option<SniffedMedia> {
    let format = image::guess_format(bytes).ok()?;
    if !ACCEPTED_IMAGE_FORMATS.contains(&format) {
        return None;
    }
    let extension = format.extensions_str().first().copied().unwrap_or("img");
    Some(SniffedMedia {
        kind: JobKind::Image,
        extension,
    })
}

fn sniff_video(bytes: &[u8]) -> Option<SniffedMedia> {
    let video = |extension| {
        Some(SniffedMedia {
            kind: JobKind::Video,
            extension,
        })
    };

    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        let brand = &bytes[8..12];
        if STILL_IMAGE_BRANDS.iter().any(|b| &b[..] == brand) {
            return None;
        }
        return match brand {
            b"qt  " => video("mov"),
            b"M4V " | b"M4VH" | b"M4VP" => video("m4v"),
            _ => video("mp4"),
        };
    }

    if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        let head = &bytes[..bytes.len().min(64)];
        let is_webm = head.windows(4).any(|w| w == b"webm");
        return video(if is_webm { "webm" } else { "mkv" });
    }

    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"AVI " {
        return video("avi");
    }

    if bytes.starts_with(b"FLV\x01") {
        return video("flv");
    }

    if bytes.starts_with(&[0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11]) {
        return video("wmv");
    }

    if bytes.starts_with(&[0x00, 0x00, 0x01, 0xBA]) {
        return video("mpg");
    }

    if is_mpeg_ts(bytes) {
        return video("ts");
    }

    None
}

/// Every packet boundary in the buffer carries the sync byte, over at least
/// [`MPEG_TS_MIN_PACKETS`] packets.
fn is_mpeg_ts(bytes: &[u8]) -> bool {
    if bytes.len() < MPEG_TS_PACKET * (MPEG_TS_MIN_PACKETS - 1) + 1 {
        return false;
    }
    bytes
        .iter()
        .step_by(MPEG_TS_PACKET)
        .all(|&b| b == MPEG_TS_SYNC)
}

/// Sanitize a client-supplied extension: ASCII alphanumerics, lower-cased, at most 8 chars.
pub fn sanitize_extension(raw: &str) -> Option<String> {
    let ext = raw.trim().trim_start_matches('.');
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_sniff_png_and_jpeg() {
        let png = sniff(fixtures::PNG_BYTES).unwrap();
        assert_eq!(png.kind, JobKind::Image);
        assert_eq!(png.extension, "png");

        let jpeg = sniff(fixtures::JPEG_BYTES).unwrap();
        assert_eq!(jpeg.kind, JobKind::Image);
        assert_eq!(jpeg.extension, "jpg");
    }

    #[test]
    fn test_sniff_mp4() {
        let mp4 = sniff(fixtures::MP4_BYTES).unwrap();
        assert_eq!(mp4.kind, JobKind::Video);
        assert_eq!(mp4.extension, "mp4");
    }

    #[test]
    fn test_sniff_matroska_and_webm() {
        let mut mkv = vec![0x1A, 0x45, 0xDF, 0xA3, 0x9F, 0x42, 0x82, 0x88];
        mkv.extend_from_slice(b"matroska");
        assert_eq!(sniff(&mkv).unwrap().extension, "mkv");

        let mut webm = vec![0x1A, 0x45, 0xDF, 0xA3, 0x9F, 0x42, 0x82, 0x84];
        webm.extend_from_slice(b"webm");
        assert_eq!(sniff(&webm).unwrap().extension, "webm");
    }

    #[test]
    fn test_sniff_avi_is_video_but_webp_is_image() {
        let avi = b"RIFF\x00\x00\x00\x00AVI LIST";
        assert_eq!(sniff(avi).unwrap().kind, JobKind::Video);

        let webp = b"RIFF\x1a\x00\x00\x00WEBPVP8 ";
        assert_eq!(sniff(webp).unwrap().kind, JobKind::Image);
    }

    #[test]
    fn test_sniff_mpeg_ts_needs_sync_at_every_packet() {
        let mut ts = vec![0u8; MPEG_TS_PACKET * 4];
        for offset in (0..ts.len()).step_by(MPEG_TS_PACKET) {
            ts[offset] = MPEG_TS_SYNC;
        }
        assert_eq!(sniff(&ts).unwrap().extension, "ts");

        ts[MPEG_TS_PACKET * 3] = 0;
        assert!(sniff(&ts).is_none());
    }

    #[test]
    fn test_sniff_mpeg_ts_rejects_short_buffers() {
        let mut ts = vec![0u8; 200];
        ts[0] = MPEG_TS_SYNC;
        ts[188] = MPEG_TS_SYNC;
        assert!(sniff(&ts).is_none());
    }

    #[test]
    fn test_sniff_text_with_g_at_packet_offsets_is_not_video() {
        let mut text = b"Good morning. ".repeat(20);
        text[188] = b'G';
        assert!(sniff(&text).is_none());
    }

    #[test]
    fn test_sniff_heic_brand_is_not_video() {
        let heic = b"\x00\x00\x00\x18ftypheic\x00\x00\x00\x00";
        assert!(sniff(heic).is_none());
    }

    #[test]
    fn test_sniff_rejects_text_and_empty() {
        assert!(sniff(b"hello, this is not media").is_none());
        assert!(sniff(&[]).is_none());
    }

    #[test]
    fn test_sanitize_extension() {
        assert_eq!(sanitize_extension(".PNG").as_deref(), Some("png"));
        assert_eq!(sanitize_extension("mp4").as_deref(), Some("mp4"));
        assert_eq!(sanitize_extension("../../etc"), None);
        assert_eq!(sanitize_extension("averyverylongext"), None);
        assert_eq!(sanitize_extension(""), None);
    }
}
