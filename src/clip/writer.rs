//! Orchestrates a single trigger into a durable journal entry
//! (SPEC_FULL.md §4.C).

use super::container::write_raw_container;
use crate::config::VideoEncodingConfig;
use crate::encoding::EncodingProfile;
use crate::error::{CaptureError, PenareiaError, Result};
use crate::journal::JournalStore;
use crate::paths;
use crate::ring_buffer::RingBuffer;
use crate::transcode::TranscoderAdapter;
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const MIN_FREE_BYTES: u64 = 1_000_000_000; // 1 GB
const MIN_FREE_BYTES_AFTER_CLEANUP: u64 = 500_000_000; // 0.5 GB
const CLEANUP_AGE_ON_LOW_SPACE: std::time::Duration = std::time::Duration::from_secs(3600);

pub struct ClipWriter {
    ring: Arc<RingBuffer>,
    transcoder: TranscoderAdapter,
    journal: Arc<JournalStore>,
    video_encoding: VideoEncodingConfig,
    save_frames: usize,
    fps: u32,
    width: u32,
    height: u32,
}

/// Result of a single successful trigger, surfaced back to the Trigger API.
pub struct ClipOutcome {
    pub arquivo: String,
    pub conversao: bool,
}

impl ClipWriter {
    pub fn new(
        ring: Arc<RingBuffer>,
        transcoder: TranscoderAdapter,
        journal: Arc<JournalStore>,
        video_encoding: VideoEncodingConfig,
        save_seconds: u32,
        fps: u32,
        width: u32,
        height: u32,
    ) -> Self {
        let save_frames = ((save_seconds as u64 * fps as u64) as usize).max(1);
        Self {
            ring,
            transcoder,
            journal,
            video_encoding,
            save_frames,
            fps,
            width,
            height,
        }
    }

    pub async fn write_triggered_clip(&self) -> Result<ClipOutcome> {
        self.ensure_storage().await?;

        let frames = self.ring.snapshot_tail(self.save_frames).await;
        if frames.is_empty() {
            return Err(PenareiaError::Capture(CaptureError::BufferEmpty));
        }

        std::fs::create_dir_all(paths::videos_root()).map_err(|e| CaptureError::DirectoryCreation {
            path: paths::videos_root().to_string_lossy().to_string(),
            source: e,
        })?;
        std::fs::create_dir_all(paths::videos_temp_dir()).map_err(|e| CaptureError::DirectoryCreation {
            path: paths::videos_temp_dir().to_string_lossy().to_string(),
            source: e,
        })?;
        std::fs::create_dir_all(paths::videos_final_dir()).map_err(|e| CaptureError::DirectoryCreation {
            path: paths::videos_final_dir().to_string_lossy().to_string(),
            source: e,
        })?;

        let base = Local::now().format("Penareia_%d-%m-%Y_%H-%M-%S").to_string();
        let temp_path = paths::videos_temp_dir().join(format!("{base}_temp.mp4"));
        let final_path = paths::videos_final_dir().join(format!("{base}.mp4"));

        write_raw_container(&frames, self.fps, self.width, self.height, &temp_path).await?;

        let profile = EncodingProfile::from_config(&self.video_encoding, self.fps, self.width, self.height);
        let conversao = match self.transcoder.transcode(&temp_path, &final_path, &profile).await {
            Ok(()) => {
                if let Err(e) = std::fs::remove_file(&temp_path) {
                    warn!("Failed to remove temp clip {}: {}", temp_path.display(), e);
                }
                true
            }
            Err(e) => return Err(e),
        };

        let remote_name = format!("{base}.mp4");
        self.journal
            .enqueue(final_path.to_string_lossy().to_string(), remote_name.clone(), true)
            .await?;

        info!("Clip {} captured and enqueued for upload", remote_name);

        Ok(ClipOutcome {
            arquivo: remote_name,
            conversao,
        })
    }

    async fn ensure_storage(&self) -> Result<()> {
        let available = available_bytes(&paths::videos_root());
        if available >= MIN_FREE_BYTES {
            return Ok(());
        }

        warn!(
            "Low disk space ({} bytes available), running opportunistic cleanup",
            available
        );
        let freed = cleanup_older_than(&paths::videos_temp_dir(), CLEANUP_AGE_ON_LOW_SPACE)
            + cleanup_older_than(&paths::videos_final_dir(), CLEANUP_AGE_ON_LOW_SPACE);
        info!("Opportunistic cleanup freed {} bytes", freed);

        let available = available_bytes(&paths::videos_root());
        if available >= MIN_FREE_BYTES_AFTER_CLEANUP {
            Ok(())
        } else {
            Err(PenareiaError::Capture(CaptureError::InsufficientStorage {
                available_bytes: available,
                required_bytes: MIN_FREE_BYTES_AFTER_CLEANUP,
            }))
        }
    }
}

/// Delete files under `dir` older than `max_age`, returning bytes freed.
/// Missing directories are treated as zero bytes freed, not an error.
fn cleanup_older_than(dir: &std::path::Path, max_age: std::time::Duration) -> u64 {
    let mut freed = 0u64;
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return 0;
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        let Ok(metadata) = entry.metadata() else { continue };
        let Ok(modified) = metadata.modified() else { continue };
        let Ok(age) = modified.elapsed() else { continue };
        if age > max_age {
            if std::fs::remove_file(&path).is_ok() {
                freed += metadata.len();
            }
        }
    }
    freed
}

#[cfg(unix)]
fn available_bytes(path: &std::path::Path) -> u64 {
    use std::ffi::CString;
    use std::mem::MaybeUninit;

    std::fs::create_dir_all(path).ok();
    let Ok(c_path) = CString::new(path.to_string_lossy().as_bytes()) else {
        return u64::MAX;
    };

    unsafe {
        let mut stat = MaybeUninit::<libc::statvfs>::uninit();
        if libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) != 0 {
            return u64::MAX; // can't determine; don't block on a broken check
        }
        let stat = stat.assume_init();
        (stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64)
    }
}

#[cfg(not(unix))]
fn available_bytes(_path: &std::path::Path) -> u64 {
    u64::MAX
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameData;
    use std::time::SystemTime;
    use tempfile::tempdir;

    fn temp_file_path(base: &str) -> PathBuf {
        paths::videos_temp_dir().join(format!("{base}_temp.mp4"))
    }

    #[test]
    fn test_cleanup_older_than_ignores_missing_dir() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert_eq!(cleanup_older_than(&missing, std::time::Duration::from_secs(1)), 0);
    }

    #[test]
    fn test_cleanup_removes_only_old_files() {
        let dir = tempdir().unwrap();
        let fresh = dir.path().join("fresh.mp4");
        std::fs::write(&fresh, b"data").unwrap();

        let freed = cleanup_older_than(dir.path(), std::time::Duration::from_secs(3600));
        assert_eq!(freed, 0);
        assert!(fresh.exists());
    }

    #[test]
    fn test_temp_file_path_nests_under_temp_dir() {
        let path = temp_file_path("Penareia_01-01-2026_00-00-00");
        assert!(path.starts_with(paths::videos_temp_dir()));
    }

    #[tokio::test]
    async fn test_write_triggered_clip_fails_on_empty_buffer() {
        let ring = Arc::new(RingBuffer::new(10));
        let dir = tempdir().unwrap();
        let (journal, _rx) = JournalStore::open(dir.path().join("queue.db")).unwrap();

        let encoding = VideoEncodingConfig {
            codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "veryfast".to_string(),
            crf: 23,
            pixel_format: "yuv420p".to_string(),
            tune: None,
            threads: 2,
            use_gpu: false,
        };

        let writer = ClipWriter::new(ring, TranscoderAdapter::new(), Arc::new(journal), encoding, 10, 24, 640, 480);
        let result = writer.write_triggered_clip().await;
        assert!(matches!(result, Err(PenareiaError::Capture(CaptureError::BufferEmpty))));
    }

    #[tokio::test]
    async fn test_save_frames_computed_from_seconds_and_fps() {
        let ring = Arc::new(RingBuffer::new(240));
        for i in 0..240u64 {
            ring.append(FrameData::new(i, SystemTime::now(), vec![0u8; 4], 640, 480)).await;
        }
        let dir = tempdir().unwrap();
        let (journal, _rx) = JournalStore::open(dir.path().join("queue.db")).unwrap();
        let encoding = VideoEncodingConfig {
            codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "veryfast".to_string(),
            crf: 23,
            pixel_format: "yuv420p".to_string(),
            tune: None,
            threads: 2,
            use_gpu: false,
        };
        let writer = ClipWriter::new(ring.clone(), TranscoderAdapter::new(), Arc::new(journal), encoding, 5, 24, 640, 480);
        assert_eq!(writer.save_frames, 120);
    }
}
