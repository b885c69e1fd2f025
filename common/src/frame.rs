use bytes::Bytes;
use image::RgbImage;
use serde::Deserialize;

/// Compressed image formats the platform accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn mime(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }
}

/// One uncompressed camera sample.
///
/// `seq` is assigned by the source that produced the frame and increases by
/// one per successful capture. `captured_at_ms` is Unix millis.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub captured_at_ms: i64,
    pub seq: u64,
}

impl Frame {
    pub fn new(image: RgbImage, captured_at_ms: i64, seq: u64) -> Self {
        Self {
            image,
            captured_at_ms,
            seq,
        }
    }

    /// Stamp a frame with the current wall-clock time.
    pub fn now(image: RgbImage, seq: u64) -> Self {
        Self::new(image, chrono::Utc::now().timestamp_millis(), seq)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}

/// A frame after compression, ready to be sent to the platform.
#[derive(Debug, Clone)]
pub struct EncodedPayload {
    pub data: Bytes,
    pub format: ImageFormat,
    pub seq: u64,
    pub captured_at_ms: i64,
}

impl EncodedPayload {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// File name sent alongside the bytes in multipart uploads.
    pub fn file_name(&self) -> String {
        format!("frame_{:06}.{}", self.seq, self.format.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_frame_detected() {
        let frame = Frame::new(RgbImage::new(0, 480), 0, 0);
        assert!(frame.is_empty());
        let frame = Frame::new(RgbImage::new(640, 480), 0, 0);
        assert!(!frame.is_empty());
        assert_eq!((frame.width(), frame.height()), (640, 480));
    }

    #[test]
    fn payload_file_name_uses_format_extension() {
        let payload = EncodedPayload {
            data: Bytes::from_static(&[0x89, b'P', b'N', b'G']),
            format: ImageFormat::Png,
            seq: 7,
            captured_at_ms: 1_708_300_000_000,
        };
        assert_eq!(payload.file_name(), "frame_000007.png");
        assert_eq!(payload.format.mime(), "image/png");
        assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
    }
}
