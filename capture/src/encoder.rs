use bytes::Bytes;
use cloud_vision_common::config::EncoderConfig;
use cloud_vision_common::frame::{EncodedPayload, Frame, ImageFormat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("cannot encode an empty {0}x{1} frame")]
    EmptyFrame(u32, u32),
    #[error("image codec failed: {0}")]
    Codec(#[from] image::ImageError),
}

/// Serializes frames into a compressed format the platform accepts.
pub trait FrameEncoder: Send + Sync {
    fn encode(&self, frame: &Frame) -> Result<EncodedPayload, EncodeError>;
}

/// PNG/JPEG encoder backed by the `image` codecs.
#[derive(Debug, Clone, Copy)]
pub struct CodecEncoder {
    format: ImageFormat,
    png_compression: u8,
    jpeg_quality: u8,
}

impl CodecEncoder {
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            format: config.format,
            png_compression: config.png_compression.min(9),
            jpeg_quality: config.jpeg_quality.clamp(1, 100),
        }
    }

    /// PNG with a zlib-style compression level, 0 (fastest) to 9 (smallest).
    pub fn png(level: u8) -> Self {
        Self {
            format: ImageFormat::Png,
            png_compression: level.min(9),
            jpeg_quality: 90,
        }
    }

    pub fn jpeg(quality: u8) -> Self {
        Self {
            format: ImageFormat::Jpeg,
            png_compression: 3,
            jpeg_quality: quality.clamp(1, 100),
        }
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }
}

impl FrameEncoder for CodecEncoder {
    fn encode(&self, frame: &Frame) -> Result<EncodedPayload, EncodeError> {
        if frame.is_empty() {
            return Err(EncodeError::EmptyFrame(frame.width(), frame.height()));
        }

        let (width, height) = (frame.width(), frame.height());
        let mut buf = Vec::with_capacity((width * height) as usize);
        match self.format {
            ImageFormat::Png => {
                PngEncoder::new_with_quality(
                    &mut buf,
                    png_compression_type(self.png_compression),
                    FilterType::Adaptive,
                )
                .write_image(frame.image.as_raw(), width, height, ExtendedColorType::Rgb8)?;
            }
            ImageFormat::Jpeg => {
                JpegEncoder::new_with_quality(&mut buf, self.jpeg_quality).write_image(
                    frame.image.as_raw(),
                    width,
                    height,
                    ExtendedColorType::Rgb8,
                )?;
            }
        }

        Ok(EncodedPayload {
            data: Bytes::from(buf),
            format: self.format,
            seq: frame.seq,
            captured_at_ms: frame.captured_at_ms,
        })
    }
}

/// The png codec exposes three speed/size presets rather than zlib levels.
fn png_compression_type(level: u8) -> CompressionType {
    match level {
        0..=1 => CompressionType::Fast,
        2..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}
