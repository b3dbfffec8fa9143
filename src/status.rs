//! Shared heartbeat and system-wide counters.
//!
//! `SystemStatus` is the in-memory single-row record backing both the
//! Supervisor's stall check and the `/status` HTTP endpoint: no
//! per-component health taxonomy, just one heartbeat fed by two producers
//! (Capture Loop, Upload Worker) and a handful of monotonic counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A timestamp (unix millis) updated by live loops; absence indicates a stall.
#[derive(Clone)]
pub struct Heartbeat {
    last_millis: Arc<AtomicU64>,
}

impl Heartbeat {
    pub fn new() -> Self {
        Self {
            last_millis: Arc::new(AtomicU64::new(now_millis())),
        }
    }

    pub fn touch(&self) {
        self.last_millis.store(now_millis(), Ordering::SeqCst);
    }

    pub fn last(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.last_millis.load(Ordering::SeqCst))
    }

    /// Time elapsed since the last touch.
    pub fn gap(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.last())
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// System-wide counters, read by the Supervisor and the `/status` endpoint.
pub struct SystemStatus {
    pub heartbeat: Heartbeat,
    started_at: SystemTime,
    captures: AtomicU64,
    uploads_success: AtomicU64,
    uploads_failed: AtomicU64,
    crashes: AtomicU64,
}

impl SystemStatus {
    pub fn new() -> Self {
        Self {
            heartbeat: Heartbeat::new(),
            started_at: SystemTime::now(),
            captures: AtomicU64::new(0),
            uploads_success: AtomicU64::new(0),
            uploads_failed: AtomicU64::new(0),
            crashes: AtomicU64::new(0),
        }
    }

    pub fn record_capture(&self) {
        self.captures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upload_success(&self) {
        self.uploads_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upload_failed(&self) {
        self.uploads_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_crash(&self) {
        self.crashes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SystemStatusSnapshot {
        SystemStatusSnapshot {
            last_heartbeat: self.heartbeat.last(),
            uptime_seconds: self
                .started_at
                .elapsed()
                .unwrap_or(Duration::ZERO)
                .as_secs(),
            captures: self.captures.load(Ordering::Relaxed),
            uploads_success: self.uploads_success.load(Ordering::Relaxed),
            uploads_failed: self.uploads_failed.load(Ordering::Relaxed),
            crashes: self.crashes.load(Ordering::Relaxed),
        }
    }
}

impl Default for SystemStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct SystemStatusSnapshot {
    pub last_heartbeat: SystemTime,
    pub uptime_seconds: u64,
    pub captures: u64,
    pub uploads_success: u64,
    pub uploads_failed: u64,
    pub crashes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_gap_starts_near_zero() {
        let hb = Heartbeat::new();
        assert!(hb.gap() < Duration::from_secs(1));
    }

    #[test]
    fn test_counters_accumulate() {
        let status = SystemStatus::new();
        status.record_capture();
        status.record_upload_success();
        status.record_upload_success();
        status.record_upload_failed();
        status.record_crash();

        let snap = status.snapshot();
        assert_eq!(snap.captures, 1);
        assert_eq!(snap.uploads_success, 2);
        assert_eq!(snap.uploads_failed, 1);
        assert_eq!(snap.crashes, 1);
    }
}
