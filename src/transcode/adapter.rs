//! Invokes the external encoder binary to produce the final delivery MP4
//! (SPEC_FULL.md §4.D).
//!
//! Two invocation strategies, tried in order: a structured async invocation
//! via `tokio::process::Command`, and a blocking `std::process::Command`
//! fallback with an equivalent argument list. Grounded on the teacher's
//! primary/fallback pattern for reconnect-vs-degraded camera handling,
//! generalized here to two invocation strategies for the same external tool.

use crate::encoding::EncodingProfile;
use crate::error::{PenareiaError, Result, TranscodeError};
use std::path::Path;
use std::process::Stdio as StdStdio;
use tokio::process::Command as AsyncCommand;
use tracing::{info, warn};

pub struct TranscoderAdapter;

impl TranscoderAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Transcode `input` into `output` per `profile`. No partial output is
    /// left in `output` on failure.
    pub async fn transcode(&self, input: &Path, output: &Path, profile: &EncodingProfile) -> Result<()> {
        match self.invoke_primary(input, output, profile).await {
            Ok(()) => Ok(()),
            Err(primary_err) => {
                warn!("Primary transcoder invocation failed, trying fallback: {}", primary_err);
                let _ = std::fs::remove_file(output);
                match self.invoke_fallback(input, output, profile) {
                    Ok(()) => Ok(()),
                    Err(fallback_err) => {
                        let _ = std::fs::remove_file(output);
                        Err(PenareiaError::Transcode(TranscodeError::BothFailed {
                            primary: primary_err.to_string(),
                            fallback: fallback_err.to_string(),
                        }))
                    }
                }
            }
        }
    }

    async fn invoke_primary(&self, input: &Path, output: &Path, profile: &EncodingProfile) -> Result<()> {
        let args = build_args(input, output, profile);
        info!("Invoking primary transcoder: ffmpeg {:?}", args);

        let status = AsyncCommand::new("ffmpeg")
            .args(&args)
            .stdin(StdStdio::null())
            .stdout(StdStdio::null())
            .stderr(StdStdio::null())
            .status()
            .await
            .map_err(|e| PenareiaError::Transcode(TranscodeError::PrimaryFailed { details: e.to_string() }))?;

        if status.success() {
            Ok(())
        } else {
            Err(PenareiaError::Transcode(TranscodeError::PrimaryFailed {
                details: format!("ffmpeg exited with {status}"),
            }))
        }
    }

    fn invoke_fallback(&self, input: &Path, output: &Path, profile: &EncodingProfile) -> Result<()> {
        let args = build_args(input, output, profile);
        info!("Invoking fallback transcoder: ffmpeg {:?}", args);

        let status = std::process::Command::new("ffmpeg")
            .args(&args)
            .stdin(StdStdio::null())
            .stdout(StdStdio::null())
            .stderr(StdStdio::null())
            .status()
            .map_err(|e| PenareiaError::Transcode(TranscodeError::FallbackFailed { details: e.to_string() }))?;

        if status.success() {
            Ok(())
        } else {
            Err(PenareiaError::Transcode(TranscodeError::FallbackFailed {
                details: format!("ffmpeg exited with {status}"),
            }))
        }
    }
}

impl Default for TranscoderAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn build_args(input: &Path, output: &Path, profile: &EncodingProfile) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-c:v".to_string(),
        profile.effective_video_codec().to_string(),
        "-preset".to_string(),
        profile.preset.clone(),
        "-crf".to_string(),
        profile.crf.to_string(),
        "-c:a".to_string(),
        profile.audio_codec.clone(),
        "-pix_fmt".to_string(),
        profile.pixel_format.clone(),
        "-r".to_string(),
        profile.fps.to_string(),
        "-s".to_string(),
        format!("{}x{}", profile.width, profile.height),
        "-movflags".to_string(),
        "faststart".to_string(),
        "-f".to_string(),
        profile.container.to_string(),
    ];

    if let Some(tuning) = &profile.arm_tuning {
        if let Some(tune) = &tuning.tune {
            args.push("-tune".to_string());
            args.push(tune.clone());
        }
        args.push("-threads".to_string());
        args.push(tuning.threads.to_string());
        args.push("-g".to_string());
        args.push(tuning.gop.to_string());
        args.push("-sc_threshold".to_string());
        args.push(tuning.scene_change_threshold.to_string());
        args.push("-profile:v".to_string());
        args.push(tuning.profile.to_string());
        args.push("-level".to_string());
        args.push(tuning.level.to_string());
    }

    args.push(output.to_string_lossy().to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_with_arm_tuning() -> EncodingProfile {
        EncodingProfile {
            container: "mp4",
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "veryfast".to_string(),
            crf: 23,
            pixel_format: "yuv420p".to_string(),
            fps: 24,
            width: 1280,
            height: 720,
            movflags_faststart: true,
            arm_tuning: Some(crate::encoding::ArmTuning {
                tune: None,
                threads: 2,
                gop: 48,
                scene_change_threshold: 0,
                profile: "baseline",
                level: "3.1",
            }),
            hardware_encoder: None,
        }
    }

    #[test]
    fn test_build_args_includes_mandatory_flags() {
        let profile = profile_with_arm_tuning();
        let args = build_args(Path::new("in.mp4"), Path::new("out.mp4"), &profile);
        assert!(args.contains(&"-crf".to_string()));
        assert!(args.contains(&"faststart".to_string()));
        assert!(args.contains(&"-g".to_string()));
        assert!(args.contains(&"baseline".to_string()));
    }

    #[test]
    fn test_build_args_omits_arm_tuning_when_absent() {
        let mut profile = profile_with_arm_tuning();
        profile.arm_tuning = None;
        let args = build_args(Path::new("in.mp4"), Path::new("out.mp4"), &profile);
        assert!(!args.contains(&"-sc_threshold".to_string()));
    }
}
