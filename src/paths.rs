//! Platform-conditioned filesystem layout.
//!
//! The daemon runs both on ARM-class hosts (Raspberry Pi, deployed as a
//! systemd service writing under `/var/lib` and `/var/log`) and on a
//! developer workstation (everything relative to the working directory).
//! Path selection is driven by the same `cfg(target_arch = ...)`-style
//! conditionals used elsewhere in this crate to detect the deployment
//! platform.

use std::path::PathBuf;

/// True on the platforms this daemon treats as "deployed" (ARM-class hosts
/// such as a Raspberry Pi). Everything else is treated as a dev workstation.
pub fn is_deployed_platform() -> bool {
    cfg!(target_arch = "arm") || cfg!(target_arch = "aarch64")
}

/// Durable upload journal database path.
pub fn journal_db_path() -> PathBuf {
    if is_deployed_platform() {
        PathBuf::from("/var/lib/penareia/queue.db")
    } else {
        PathBuf::from("./data/queue.db")
    }
}

/// Log file path, used when file-backed logging is enabled.
pub fn log_file_path() -> PathBuf {
    if is_deployed_platform() {
        PathBuf::from("/var/log/penareia.log")
    } else {
        PathBuf::from("./logs/penareia.log")
    }
}

/// Root directory for clip output (`videos/temp`, `videos/final`).
pub fn videos_root() -> PathBuf {
    PathBuf::from("videos")
}

pub fn videos_temp_dir() -> PathBuf {
    videos_root().join("temp")
}

pub fn videos_final_dir() -> PathBuf {
    videos_root().join("final")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_dirs_nest_under_root() {
        assert!(videos_temp_dir().starts_with(videos_root()));
        assert!(videos_final_dir().starts_with(videos_root()));
    }
}
