use std::future::Future;
use std::io::Cursor;
use std::path::Path;

use cloud_vision_common::config::CameraConfig;
use cloud_vision_common::frame::Frame;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, RgbImage};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("failed to build camera client: {0}")]
    Client(reqwest::Error),
    #[error("camera request failed: {0}")]
    Request(reqwest::Error),
    #[error("camera returned HTTP {0}")]
    Status(u16),
    #[error("camera returned an empty image")]
    Empty,
    #[error("failed to decode camera image: {0}")]
    Decode(image::ImageError),
    #[error("failed to open image {0}: {1}")]
    Open(String, image::ImageError),
}

/// A source of frames pulled on demand. One call returns in bounded time.
pub trait Sampler: Send {
    fn try_capture(&mut self) -> impl Future<Output = Result<Frame, SampleError>> + Send;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Pulls single stills from a camera or robot snapshot endpoint.
pub struct HttpSnapshotSampler {
    client: reqwest::Client,
    url: String,
    max_size: Option<(u32, u32)>,
    seq: u64,
}

impl HttpSnapshotSampler {
    pub fn new(config: &CameraConfig) -> Result<Self, SampleError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(SampleError::Client)?;
        let max_size = match (config.width, config.height) {
            (Some(w), Some(h)) => Some((w, h)),
            (Some(w), None) => Some((w, u32::MAX)),
            (None, Some(h)) => Some((u32::MAX, h)),
            (None, None) => None,
        };
        Ok(Self {
            client,
            url: config.url.clone(),
            max_size,
            seq: 0,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Sampler for HttpSnapshotSampler {
    async fn try_capture(&mut self) -> Result<Frame, SampleError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(SampleError::Request)?;
        if !resp.status().is_success() {
            return Err(SampleError::Status(resp.status().as_u16()));
        }
        let body = resp.bytes().await.map_err(SampleError::Request)?;
        if body.is_empty() {
            return Err(SampleError::Empty);
        }

        let image = decode(&body)?;
        let image = fit_within(image, self.max_size);
        if image.width() == 0 || image.height() == 0 {
            return Err(SampleError::Empty);
        }

        let frame = Frame::now(image.to_rgb8(), self.seq);
        self.seq += 1;
        debug!(
            seq = frame.seq,
            width = frame.width(),
            height = frame.height(),
            bytes = body.len(),
            "captured snapshot"
        );
        Ok(frame)
    }

    fn name(&self) -> &str {
        "http-snapshot"
    }
}

/// Serves the same still image on every call, for running without a camera.
pub struct StillImageSampler {
    image: RgbImage,
    seq: u64,
}

impl StillImageSampler {
    pub fn open(path: &Path) -> Result<Self, SampleError> {
        let image = image::open(path)
            .map_err(|e| SampleError::Open(path.display().to_string(), e))?
            .to_rgb8();
        Ok(Self::from_image(image))
    }

    pub fn from_image(image: RgbImage) -> Self {
        Self { image, seq: 0 }
    }
}

impl Sampler for StillImageSampler {
    async fn try_capture(&mut self) -> Result<Frame, SampleError> {
        if self.image.width() == 0 || self.image.height() == 0 {
            return Err(SampleError::Empty);
        }
        let frame = Frame::now(self.image.clone(), self.seq);
        self.seq += 1;
        Ok(frame)
    }

    fn name(&self) -> &str {
        "still-image"
    }
}

fn decode(data: &[u8]) -> Result<DynamicImage, SampleError> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| SampleError::Decode(image::ImageError::IoError(e)))?
        .decode()
        .map_err(SampleError::Decode)
}

/// Scale down, keeping the aspect ratio, so the image fits in `max_size`.
fn fit_within(image: DynamicImage, max_size: Option<(u32, u32)>) -> DynamicImage {
    match max_size {
        Some((w, h)) if image.width() > w || image.height() > h => {
            image.resize(w, h, FilterType::Triangle)
        }
        _ => image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 200, 30]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    /// Answer every connection with the same status and body.
    async fn camera(status: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let body = body.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let head = format!(
                        "HTTP/1.1 {status}\r\ncontent-type: image/png\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(&body).await;
                });
            }
        });
        format!("http://{addr}/frame")
    }

    fn camera_config(url: String) -> CameraConfig {
        CameraConfig {
            url,
            ..CameraConfig::default()
        }
    }

    #[tokio::test]
    async fn snapshot_is_decoded_and_sequenced() {
        let url = camera("200 OK", png_bytes(32, 24)).await;
        let mut sampler = HttpSnapshotSampler::new(&camera_config(url)).unwrap();
        let first = sampler.try_capture().await.unwrap();
        let second = sampler.try_capture().await.unwrap();
        assert_eq!((first.width(), first.height()), (32, 24));
        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);
    }

    #[tokio::test]
    async fn large_snapshot_is_scaled_down() {
        let url = camera("200 OK", png_bytes(1280, 960)).await;
        let config = CameraConfig {
            width: Some(640),
            height: Some(480),
            ..camera_config(url)
        };
        let mut sampler = HttpSnapshotSampler::new(&config).unwrap();
        let frame = sampler.try_capture().await.unwrap();
        assert_eq!((frame.width(), frame.height()), (640, 480));
    }

    #[tokio::test]
    async fn empty_body_is_an_error() {
        let url = camera("200 OK", Vec::new()).await;
        let mut sampler = HttpSnapshotSampler::new(&camera_config(url)).unwrap();
        assert!(matches!(sampler.try_capture().await, Err(SampleError::Empty)));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let url = camera("404 Not Found", Vec::new()).await;
        let mut sampler = HttpSnapshotSampler::new(&camera_config(url)).unwrap();
        assert!(matches!(sampler.try_capture().await, Err(SampleError::Status(404))));
    }

    #[tokio::test]
    async fn garbage_is_a_decode_error() {
        let url = camera("200 OK", b"not an image".to_vec()).await;
        let mut sampler = HttpSnapshotSampler::new(&camera_config(url)).unwrap();
        assert!(matches!(sampler.try_capture().await, Err(SampleError::Decode(_))));
        // The failed pull does not consume a sequence number.
        assert_eq!(sampler.seq, 0);
    }

    #[tokio::test]
    async fn still_image_repeats() {
        let mut sampler = StillImageSampler::from_image(RgbImage::new(8, 8));
        assert_eq!(sampler.try_capture().await.unwrap().seq, 0);
        assert_eq!(sampler.try_capture().await.unwrap().seq, 1);

        let mut empty = StillImageSampler::from_image(RgbImage::new(0, 0));
        assert!(matches!(empty.try_capture().await, Err(SampleError::Empty)));
    }
}
