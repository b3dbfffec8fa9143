#![allow(dead_code)]

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

const PLACEHOLDER_KEY_ID: &str = "your_key_id_here";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PenareiaConfig {
    pub video: VideoConfig,
    pub webhook: WebhookConfig,
    pub backblaze_b2: BackblazeConfig,
    pub server: ServerConfig,
    pub video_encoding: VideoEncodingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VideoConfig {
    /// Device index (e.g. "0") or a URL string for a network source.
    pub source: String,

    pub buffer_seconds: u32,
    pub save_seconds: u32,

    #[serde(default = "default_force_fps")]
    pub force_fps: u32,

    #[serde(default = "default_max_width")]
    pub max_width: u32,

    #[serde(default = "default_max_height")]
    pub max_height: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebhookConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BackblazeConfig {
    pub key_id: String,
    pub application_key: String,
    pub bucket_name: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub enable_mdns: bool,

    #[serde(default = "default_service_name")]
    pub service_name: String,

    #[serde(default = "default_threads")]
    pub threads: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VideoEncodingConfig {
    pub codec: String,
    pub audio_codec: String,
    pub preset: String,
    pub crf: u32,
    pub pixel_format: String,

    #[serde(default)]
    pub tune: Option<String>,

    #[serde(default = "default_encoding_threads")]
    pub threads: u32,

    #[serde(default)]
    pub use_gpu: bool,
}

impl PenareiaConfig {
    /// Load configuration from the default `penareia.ini` path.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("penareia.ini")
    }

    /// Load configuration from an INI file, layered over built-in defaults
    /// and `PENAREIA_`-prefixed environment variables.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("video.force_fps", default_force_fps())?
            .set_default("video.max_width", default_max_width())?
            .set_default("video.max_height", default_max_height())?
            .set_default("server.debug", false)?
            .set_default("server.enable_mdns", false)?
            .set_default("server.service_name", default_service_name())?
            .set_default("server.threads", default_threads())?
            .set_default("video_encoding.threads", default_encoding_threads())?
            .set_default("video_encoding.use_gpu", false)?
            .add_source(File::new(&path_str, FileFormat::Ini).required(false))
            .add_source(Environment::with_prefix("PENAREIA").separator("_"))
            .build()?;

        let config: PenareiaConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully from {}", path_str);
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate field ranges and cross-field constraints.
    ///
    /// Mirrors `validate_config.py`'s checks in the original implementation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.video.save_seconds == 0 || self.video.buffer_seconds == 0 {
            return Err(ConfigError::Message(
                "BUFFER_SECONDS and SAVE_SECONDS must be greater than 0".to_string(),
            ));
        }

        if self.video.save_seconds > self.video.buffer_seconds {
            return Err(ConfigError::Message(
                "SAVE_SECONDS must be less than or equal to BUFFER_SECONDS".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::Message(
                "PORT must be between 1 and 65535".to_string(),
            ));
        }

        if self.video_encoding.crf > 51 {
            return Err(ConfigError::Message("CRF must be between 0 and 51".to_string()));
        }

        if self.backblaze_b2.key_id == PLACEHOLDER_KEY_ID {
            return Err(ConfigError::Message(
                "BACKBLAZE_B2.KEY_ID is still set to the placeholder value".to_string(),
            ));
        }

        Ok(())
    }

    /// Parse `video.source` as a device index, falling back to a URL string.
    pub fn video_source(&self) -> VideoSource {
        match self.video.source.parse::<u32>() {
            Ok(index) => VideoSource::DeviceIndex(index),
            Err(_) => VideoSource::Url(self.video.source.clone()),
        }
    }
}

/// Resolved form of `[VIDEO] SOURCE`: either a local device index or a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    DeviceIndex(u32),
    Url(String),
}

fn default_force_fps() -> u32 {
    24
}
fn default_max_width() -> u32 {
    1280
}
fn default_max_height() -> u32 {
    720
}
fn default_service_name() -> String {
    "penareia".to_string()
}
fn default_threads() -> u32 {
    4
}
fn default_encoding_threads() -> u32 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_ini() -> String {
        r#"
[VIDEO]
SOURCE = 0
BUFFER_SECONDS = 30
SAVE_SECONDS = 10

[WEBHOOK]
URL = https://example.com/hook

[BACKBLAZE_B2]
KEY_ID = real_key
APPLICATION_KEY = real_secret
BUCKET_NAME = penareia-clips

[SERVER]
HOST = 0.0.0.0
PORT = 5000
DEBUG = false

[VIDEO_ENCODING]
CODEC = libx264
AUDIO_CODEC = aac
PRESET = veryfast
CRF = 23
PIXEL_FORMAT = yuv420p
"#
        .to_string()
    }

    #[test]
    fn test_load_and_validate() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_ini().as_bytes()).unwrap();

        let config = PenareiaConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.video.buffer_seconds, 30);
        assert_eq!(config.video.save_seconds, 10);
        assert_eq!(config.video.force_fps, 24); // default
        assert_eq!(config.server.port, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_seconds_exceeds_buffer_fails_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut ini = sample_ini();
        ini = ini.replace("SAVE_SECONDS = 10", "SAVE_SECONDS = 60");
        file.write_all(ini.as_bytes()).unwrap();

        let config = PenareiaConfig::load_from_file(file.path()).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_placeholder_key_id_fails_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let ini = sample_ini().replace("KEY_ID = real_key", "KEY_ID = your_key_id_here");
        file.write_all(ini.as_bytes()).unwrap();

        let config = PenareiaConfig::load_from_file(file.path()).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_crf_out_of_range_fails_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let ini = sample_ini().replace("CRF = 23", "CRF = 99");
        file.write_all(ini.as_bytes()).unwrap();

        let config = PenareiaConfig::load_from_file(file.path()).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_video_source_parsing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let ini = sample_ini().replace("SOURCE = 0", "SOURCE = rtsp://camera.local/stream");
        file.write_all(ini.as_bytes()).unwrap();

        let config = PenareiaConfig::load_from_file(file.path()).unwrap();
        assert_eq!(
            config.video_source(),
            VideoSource::Url("rtsp://camera.local/stream".to_string())
        );
    }

    #[test]
    fn test_video_source_device_index() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_ini().as_bytes()).unwrap();

        let config = PenareiaConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.video_source(), VideoSource::DeviceIndex(0));
    }
}
