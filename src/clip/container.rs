//! Writes a frame snapshot to a raw mp4v container (SPEC_FULL.md §4.C step 5).
//!
//! Shells out to `ffmpeg` reading an `image2pipe` MJPEG stream on stdin and
//! writing a raw `mp4v`-coded MP4 to disk — the same subprocess boundary the
//! Capture Loop uses to read frames, kept consistent rather than adding a
//! second encoding dependency.

use crate::error::{CaptureError, PenareiaError, Result};
use crate::frame::FrameData;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

pub async fn write_raw_container(frames: &[FrameData], fps: u32, width: u32, height: u32, output_path: &Path) -> Result<()> {
    let args = vec![
        "-y".to_string(),
        "-f".to_string(),
        "image2pipe".to_string(),
        "-vcodec".to_string(),
        "mjpeg".to_string(),
        "-r".to_string(),
        fps.to_string(),
        "-i".to_string(),
        "-".to_string(),
        "-s".to_string(),
        format!("{width}x{height}"),
        "-vcodec".to_string(),
        "mpeg4".to_string(),
        "-an".to_string(),
        output_path.to_string_lossy().to_string(),
    ];

    debug!("Writing raw container via ffmpeg: {:?}", args);

    let mut child = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| CaptureError::WriterOpenFailed { details: e.to_string() })?;

    let mut stdin = child.stdin.take().ok_or_else(|| CaptureError::WriterOpenFailed {
        details: "ffmpeg produced no stdin pipe".to_string(),
    })?;

    for frame in frames {
        if let Err(e) = stdin.write_all(&frame.data).await {
            return Err(PenareiaError::Capture(CaptureError::WriterWriteFailed { details: e.to_string() }));
        }
    }
    drop(stdin);

    let status = child
        .wait()
        .await
        .map_err(|e| CaptureError::WriterWriteFailed { details: e.to_string() })?;

    if !status.success() {
        return Err(PenareiaError::Capture(CaptureError::WriterWriteFailed {
            details: format!("ffmpeg exited with {status}"),
        }));
    }

    Ok(())
}
