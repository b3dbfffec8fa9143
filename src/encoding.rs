//! The immutable option set handed to the Transcoder Adapter.

use crate::config::VideoEncodingConfig;
use serde::{Deserialize, Serialize};

/// Declarative description of how a clip should be transcoded.
///
/// Built once per trigger from [`VideoEncodingConfig`] plus the frozen
/// capture resolution/FPS; never mutated afterwards. The platform-conditional
/// extension set mirrors the teacher's `#[cfg(target_os = "linux")]` GStreamer
/// pipeline conditionals in `capture/encode.rs`, generalized to an ARM-vs-not
/// flag since that's what actually gates these options in the source system
/// (Raspberry Pi deployments).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingProfile {
    pub container: &'static str,
    pub video_codec: String,
    pub audio_codec: String,
    pub preset: String,
    pub crf: u32,
    pub pixel_format: String,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub movflags_faststart: bool,
    pub arm_tuning: Option<ArmTuning>,
    pub hardware_encoder: Option<String>,
}

/// Extension set applied only on ARM targets (Raspberry Pi class hosts).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmTuning {
    pub tune: Option<String>,
    pub threads: u32,
    pub gop: u32,
    pub scene_change_threshold: u32,
    pub profile: &'static str,
    pub level: &'static str,
}

impl EncodingProfile {
    pub fn from_config(cfg: &VideoEncodingConfig, fps: u32, width: u32, height: u32) -> Self {
        let arm_tuning = if crate::paths::is_deployed_platform() {
            Some(ArmTuning {
                tune: cfg.tune.clone(),
                threads: cfg.threads,
                gop: 2 * fps,
                scene_change_threshold: 0,
                profile: "baseline",
                level: "3.1",
            })
        } else {
            None
        };

        let hardware_encoder = if cfg.use_gpu {
            Some(hardware_encoder_name(&cfg.codec))
        } else {
            None
        };

        Self {
            container: "mp4",
            video_codec: cfg.codec.clone(),
            audio_codec: cfg.audio_codec.clone(),
            preset: cfg.preset.clone(),
            crf: cfg.crf,
            pixel_format: cfg.pixel_format.clone(),
            fps,
            width,
            height,
            movflags_faststart: true,
            arm_tuning,
            hardware_encoder,
        }
    }

    /// The codec flag to actually pass to the encoder: the hardware encoder
    /// name when GPU acceleration is requested, the configured software codec
    /// otherwise. Callers fall back to the software codec if the hardware
    /// path fails (§4.D "best-effort fallback to software").
    pub fn effective_video_codec(&self) -> &str {
        self.hardware_encoder.as_deref().unwrap_or(&self.video_codec)
    }
}

/// Best-effort mapping from a software codec name to its Raspberry Pi
/// hardware-accelerated counterpart (V4L2 M2M encoders).
fn hardware_encoder_name(software_codec: &str) -> String {
    match software_codec {
        "libx264" => "h264_v4l2m2m".to_string(),
        "libx265" => "hevc_v4l2m2m".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> VideoEncodingConfig {
        VideoEncodingConfig {
            codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "veryfast".to_string(),
            crf: 23,
            pixel_format: "yuv420p".to_string(),
            tune: None,
            threads: 2,
            use_gpu: false,
        }
    }

    #[test]
    fn test_profile_from_config() {
        let profile = EncodingProfile::from_config(&sample_config(), 24, 1280, 720);
        assert_eq!(profile.container, "mp4");
        assert_eq!(profile.fps, 24);
        assert_eq!(profile.width, 1280);
        assert!(profile.movflags_faststart);
    }

    #[test]
    fn test_hardware_encoder_substitution() {
        let mut cfg = sample_config();
        cfg.use_gpu = true;
        let profile = EncodingProfile::from_config(&cfg, 24, 1280, 720);
        assert_eq!(profile.effective_video_codec(), "h264_v4l2m2m");
    }

    #[test]
    fn test_software_codec_when_gpu_disabled() {
        let profile = EncodingProfile::from_config(&sample_config(), 24, 1280, 720);
        assert_eq!(profile.effective_video_codec(), "libx264");
    }
}
