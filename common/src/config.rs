use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::frame::ImageFormat;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub platform: PlatformConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Address and credentials of the cloud vision platform.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub token: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// Snapshot endpoint returning one still image per GET.
    #[serde(default = "default_camera_url")]
    pub url: String,
    #[serde(default = "default_camera_timeout")]
    pub timeout_ms: u64,
    /// Optional downscale target. Frames larger than this are resized.
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncoderConfig {
    #[serde(default)]
    pub format: ImageFormat,
    #[serde(default = "default_png_compression")]
    pub png_compression: u8,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_min_interval")]
    pub min_interval_ms: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// How long single-shot runs wait for the reply before the process exits.
    #[serde(default = "default_once_grace")]
    pub once_grace_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewerConfig {
    #[serde(default = "default_viewer_enabled")]
    pub enabled: bool,
    #[serde(default = "default_viewer_bind")]
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_speech_command")]
    pub command: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: default_camera_url(),
            timeout_ms: default_camera_timeout(),
            width: None,
            height: None,
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            format: ImageFormat::default(),
            png_compression: default_png_compression(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval(),
            poll_interval_ms: default_poll_interval(),
            once_grace_ms: default_once_grace(),
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            enabled: default_viewer_enabled(),
            bind: default_viewer_bind(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: default_speech_command(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.min_interval_ms == 0 {
            return Err(ConfigError::Invalid("capture.min_interval_ms must be > 0".into()));
        }
        if self.capture.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("capture.poll_interval_ms must be > 0".into()));
        }
        if self.encoder.png_compression > 9 {
            return Err(ConfigError::Invalid(format!(
                "encoder.png_compression must be 0-9, got {}",
                self.encoder.png_compression
            )));
        }
        if !(1..=100).contains(&self.encoder.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "encoder.jpeg_quality must be 1-100, got {}",
                self.encoder.jpeg_quality
            )));
        }
        if self.platform.host.is_empty() {
            return Err(ConfigError::Invalid("platform.host must not be empty".into()));
        }
        Ok(())
    }
}

impl PlatformConfig {
    /// Base URL every service path is appended to.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl CameraConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Replace the host of the snapshot URL with a device address given on the
    /// command line, keeping the configured path.
    pub fn with_device(&self, device: &str) -> Self {
        let path = self
            .url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.url)
            .split_once('/')
            .map(|(_, path)| path)
            .unwrap_or("frame");
        Self {
            url: format!("http://{device}/{path}"),
            ..self.clone()
        }
    }
}

impl CaptureConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn once_grace(&self) -> Duration {
        Duration::from_millis(self.once_grace_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_port() -> u16 {
    9001
}
fn default_scheme() -> String {
    "http".into()
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_request_timeout() -> u64 {
    30
}
fn default_camera_url() -> String {
    "http://127.0.0.1:8080/frame".into()
}
fn default_camera_timeout() -> u64 {
    2000
}
fn default_png_compression() -> u8 {
    3
}
fn default_jpeg_quality() -> u8 {
    90
}
fn default_min_interval() -> u64 {
    300
}
fn default_poll_interval() -> u64 {
    30
}
fn default_once_grace() -> u64 {
    5000
}
fn default_viewer_enabled() -> bool {
    true
}
fn default_viewer_bind() -> String {
    "127.0.0.1:8090".into()
}
fn default_speech_command() -> String {
    "espeak".into()
}
fn default_log_level() -> String {
    "info".into()
}
