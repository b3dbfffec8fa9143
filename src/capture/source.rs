//! Camera access abstracted behind a small trait.
//!
//! Grounded on the teacher's split between `CameraInterface` (the thing that
//! talks to hardware) and the ring-buffer integration that consumes it
//! (`src/camera/interface.rs`): production code and tests share one trait so
//! capture-loop behavior (reconnect policy, heartbeat cadence, degraded
//! state) can be exercised without real camera hardware.

use crate::config::VideoSource;
use crate::error::{CaptureError, Result};
use crate::frame::FrameData;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::SystemTime;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// What the Capture Loop needs from a camera: open once, read frames, close.
#[async_trait]
pub trait CameraSource: Send {
    /// Open the configured source and apply platform-conditioned constraints
    /// (FPS cap, resolution cap, MJPG fourcc, minimal driver buffer). Returns
    /// the resolution the device actually reports once opened.
    async fn open(&mut self) -> Result<(u32, u32)>;

    /// Read a single decoded frame. An `Err` counts as one consecutive
    /// failure toward the Capture Loop's reconnect threshold.
    async fn read_frame(&mut self, frame_id: u64) -> Result<FrameData>;

    async fn close(&mut self);
}

/// Production camera source: shells out to `ffmpeg` to read an MJPEG stream
/// from a V4L2 device or a network URL, rather than linking an OpenCV/GStreamer
/// binding directly — the external encoder binary is already an out-of-scope
/// collaborator per SPEC_FULL.md §1, so capture reuses the same subprocess
/// boundary instead of adding a second native dependency.
pub struct FfmpegCameraSource {
    source: VideoSource,
    force_fps: u32,
    max_width: u32,
    max_height: u32,
    child: Option<Child>,
    reader: Option<BufReader<tokio::process::ChildStdout>>,
    resolution: (u32, u32),
}

impl FfmpegCameraSource {
    pub fn new(source: VideoSource, force_fps: u32, max_width: u32, max_height: u32) -> Self {
        Self {
            source,
            force_fps,
            max_width,
            max_height,
            child: None,
            reader: None,
            resolution: (max_width, max_height),
        }
    }

    fn input_args(&self) -> Vec<String> {
        match &self.source {
            VideoSource::DeviceIndex(idx) => vec![
                "-f".to_string(),
                "v4l2".to_string(),
                "-input_format".to_string(),
                "mjpeg".to_string(),
                "-video_size".to_string(),
                format!("{}x{}", self.max_width, self.max_height),
                "-i".to_string(),
                format!("/dev/video{}", idx),
            ],
            VideoSource::Url(url) => vec!["-i".to_string(), url.clone()],
        }
    }
}

#[async_trait]
impl CameraSource for FfmpegCameraSource {
    async fn open(&mut self) -> Result<(u32, u32)> {
        let mut args = self.input_args();
        args.extend([
            "-r".to_string(),
            self.force_fps.to_string(),
            "-vf".to_string(),
            format!(
                "scale='min({},iw)':'min({},ih)':force_original_aspect_ratio=decrease",
                self.max_width, self.max_height
            ),
            "-vcodec".to_string(),
            "mjpeg".to_string(),
            "-f".to_string(),
            "image2pipe".to_string(),
            "-".to_string(),
        ]);

        debug!("Opening camera source via ffmpeg: {:?}", args);

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CaptureError::SourceOpen {
                source_desc: format!("{:?}: {}", self.source, e),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| CaptureError::SourceOpen {
            source_desc: "ffmpeg produced no stdout pipe".to_string(),
        })?;

        self.reader = Some(BufReader::new(stdout));
        self.child = Some(child);
        self.resolution = (self.max_width, self.max_height);

        info!(
            "Camera source opened ({:?}), frozen resolution {}x{}",
            self.source, self.resolution.0, self.resolution.1
        );

        Ok(self.resolution)
    }

    async fn read_frame(&mut self, frame_id: u64) -> Result<FrameData> {
        let reader = self.reader.as_mut().ok_or_else(|| CaptureError::SourceOpen {
            source_desc: "read_frame called before open".to_string(),
        })?;

        let data = read_one_jpeg_frame(reader).await.map_err(|e| {
            warn!("Camera read failed: {}", e);
            CaptureError::ReadExhausted { attempts: 1 }
        })?;

        Ok(FrameData::new(
            frame_id,
            SystemTime::now(),
            data,
            self.resolution.0,
            self.resolution.1,
        ))
    }

    async fn close(&mut self) {
        self.reader = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
        }
    }
}

/// Scan an MJPEG byte stream for one JPEG frame delimited by SOI (`FFD8`) and
/// EOI (`FFD9`) markers.
async fn read_one_jpeg_frame<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut R,
) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];

    // Seek to SOI.
    loop {
        reader.read_exact(&mut byte).await?;
        if byte[0] == 0xFF {
            reader.read_exact(&mut byte).await?;
            if byte[0] == 0xD8 {
                buf.push(0xFF);
                buf.push(0xD8);
                break;
            }
        }
    }

    // Copy until EOI.
    loop {
        reader.read_exact(&mut byte).await?;
        buf.push(byte[0]);
        if byte[0] == 0xFF {
            reader.read_exact(&mut byte).await?;
            buf.push(byte[0]);
            if byte[0] == 0xD9 {
                break;
            }
        }
    }

    Ok(buf)
}

/// Deterministic in-memory source used by tests and `--dry-run` probing.
pub struct MockCameraSource {
    pub resolution: (u32, u32),
    pub frames_available: usize,
    pub fail_after: Option<usize>,
    served: usize,
}

impl MockCameraSource {
    pub fn new(resolution: (u32, u32), frames_available: usize) -> Self {
        Self {
            resolution,
            frames_available,
            fail_after: None,
            served: 0,
        }
    }

    pub fn with_fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }
}

#[async_trait]
impl CameraSource for MockCameraSource {
    async fn open(&mut self) -> Result<(u32, u32)> {
        Ok(self.resolution)
    }

    async fn read_frame(&mut self, frame_id: u64) -> Result<FrameData> {
        if let Some(fail_after) = self.fail_after {
            if self.served >= fail_after {
                return Err(CaptureError::ReadExhausted { attempts: 1 }.into());
            }
        }
        if self.served >= self.frames_available {
            return Err(CaptureError::ReadExhausted { attempts: 1 }.into());
        }
        self.served += 1;
        Ok(FrameData::new(
            frame_id,
            SystemTime::now(),
            vec![0u8; 64],
            self.resolution.0,
            self.resolution.1,
        ))
    }

    async fn close(&mut self) {}
}
