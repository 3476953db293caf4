//! Image format detection
//!
//! The pipeline does no decoding or transformation; it only sniffs the
//! leading magic bytes so the object key extension and the stored content
//! type match what the camera actually produced.

/// Image formats accepted by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Webp,
}

impl ImageFormat {
    /// Detect the format from the payload's magic bytes
    ///
    /// Returns `None` for payloads that are not a recognized image; those
    /// are rejected before any stage runs.
    pub fn detect(bytes: &[u8]) -> Option<ImageFormat> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(b"GIF8") {
            Some(ImageFormat::Gif)
        } else if bytes.starts_with(b"BM") {
            Some(ImageFormat::Bmp)
        } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
            Some(ImageFormat::Webp)
        } else {
            None
        }
    }

    /// Lowercase file extension used in object keys
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Webp => "webp",
        }
    }

    /// MIME type sent to the object store
    ///
    /// Derived from the detected format so non-JPEG captures are not
    /// mislabeled as `image/jpeg`.
    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Webp => "image/webp",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_jpeg() {
        let bytes = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
        assert_eq!(ImageFormat::detect(&bytes), Some(ImageFormat::Jpeg));
    }

    #[test]
    fn test_detect_png() {
        let bytes = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00];
        assert_eq!(ImageFormat::detect(&bytes), Some(ImageFormat::Png));
    }

    #[test]
    fn test_detect_gif() {
        assert_eq!(ImageFormat::detect(b"GIF89a trailer"), Some(ImageFormat::Gif));
    }

    #[test]
    fn test_detect_bmp() {
        assert_eq!(ImageFormat::detect(b"BM\x00\x00\x00\x00"), Some(ImageFormat::Bmp));
    }

    #[test]
    fn test_detect_webp() {
        assert_eq!(
            ImageFormat::detect(b"RIFF\x00\x00\x00\x00WEBPVP8 "),
            Some(ImageFormat::Webp)
        );
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(ImageFormat::detect(b"not an image"), None);
        assert_eq!(ImageFormat::detect(&[]), None);
        // RIFF container that is not WEBP (e.g. WAV)
        assert_eq!(ImageFormat::detect(b"RIFF\x00\x00\x00\x00WAVEfmt "), None);
    }

    #[test]
    fn test_extension_and_content_type() {
        assert_eq!(ImageFormat::Jpeg.extension(), "jpeg");
        assert_eq!(ImageFormat::Jpeg.content_type(), "image/jpeg");
        assert_eq!(ImageFormat::Png.extension(), "png");
        assert_eq!(ImageFormat::Png.content_type(), "image/png");
        assert_eq!(ImageFormat::Webp.content_type(), "image/webp");
    }
}
