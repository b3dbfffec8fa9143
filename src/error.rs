#![allow(dead_code)]

use thiserror::Error;

/// Main error type for the Penareia capture daemon
#[derive(Error, Debug)]
pub enum PenareiaError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration invalid: {0}")]
    ConfigInvalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ring buffer error: {0}")]
    RingBuffer(#[from] RingBufferError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Stream server error: {0}")]
    Stream(#[from] StreamError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },

    #[error("Stall detected: no heartbeat for {gap_seconds}s")]
    StallDetected { gap_seconds: u64 },

    #[error("Graceful shutdown requested")]
    Shutdown,
}

/// Ring buffer error types
#[derive(Error, Debug, Clone)]
pub enum RingBufferError {
    #[error("Buffer empty: no frames available")]
    BufferEmpty,

    #[error("Invalid capacity: {0}")]
    InvalidCapacity(usize),
}

/// Camera / capture-loop error types
#[derive(Error, Debug, Clone)]
pub enum CaptureError {
    #[error("Failed to open camera source {source_desc}")]
    SourceOpen { source_desc: String },

    #[error("Camera read failed after {attempts} consecutive failures")]
    ReadExhausted { attempts: u32 },

    #[error("Camera reconnect exhausted after {sessions} sessions")]
    ReconnectExhausted { sessions: u32 },

    #[error("Insufficient storage: {available_bytes} bytes available, {required_bytes} required")]
    InsufficientStorage {
        available_bytes: u64,
        required_bytes: u64,
    },

    #[error("Buffer empty: no frames to snapshot")]
    BufferEmpty,

    #[error("Failed to open clip writer: {details}")]
    WriterOpenFailed { details: String },

    #[error("Failed to write clip: {details}")]
    WriterWriteFailed { details: String },

    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreation {
        path: String,
        source: std::io::Error,
    },
}

/// Transcoder adapter error types
#[derive(Error, Debug, Clone)]
pub enum TranscodeError {
    #[error("Primary transcoder invocation failed: {details}")]
    PrimaryFailed { details: String },

    #[error("Fallback transcoder invocation failed: {details}")]
    FallbackFailed { details: String },

    #[error("Both primary and fallback transcoder invocations failed: {primary} / {fallback}")]
    BothFailed { primary: String, fallback: String },
}

/// Upload journal (durable store) error types
#[derive(Error, Debug)]
pub enum JournalError {
    #[error("Failed to open journal store at {path}: {details}")]
    StoreOpen { path: String, details: String },

    #[error("Journal connection acquisition timed out after {timeout_secs}s")]
    AcquireTimeout { timeout_secs: u64 },

    #[error("Journal query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Enqueue failed: {details}")]
    EnqueueFailed { details: String },

    #[error("Journal entry {id} not found")]
    NotFound { id: i64 },
}

/// Upload worker error types
#[derive(Error, Debug, Clone)]
pub enum UploadError {
    #[error("Local file missing: {path}")]
    LocalFileMissing { path: String },

    #[error("Integrity mismatch for {path}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Object store authorization failed: {details}")]
    AuthFailed { details: String },

    #[error("Object store transport failed: {details}")]
    TransportFailed { details: String },

    #[error("Webhook delivery failed: {details}")]
    WebhookFailed { details: String },
}

/// HTTP stream/server error types
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Failed to bind to {address}: {source}")]
    BindFailed {
        address: String,
        source: std::io::Error,
    },

    #[error("Server startup failed: {details}")]
    StartupFailed { details: String },
}

impl PenareiaError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Whether this error represents a condition the caller should retry locally.
    pub fn is_recoverable(&self) -> bool {
        match self {
            PenareiaError::Capture(CaptureError::SourceOpen { .. }) => true,
            PenareiaError::Capture(CaptureError::ReadExhausted { .. }) => true,
            PenareiaError::Upload(UploadError::TransportFailed { .. }) => true,
            PenareiaError::Upload(UploadError::AuthFailed { .. }) => true,
            PenareiaError::Io(_) => true,
            PenareiaError::Shutdown => false,
            PenareiaError::StallDetected { .. } => false,
            _ => false,
        }
    }

    pub fn component_name(&self) -> String {
        match self {
            PenareiaError::Capture(_) => "capture".to_string(),
            PenareiaError::Transcode(_) => "transcode".to_string(),
            PenareiaError::Journal(_) => "journal".to_string(),
            PenareiaError::Upload(_) => "upload".to_string(),
            PenareiaError::Stream(_) => "stream".to_string(),
            PenareiaError::RingBuffer(_) => "ring_buffer".to_string(),
            PenareiaError::Config(_) | PenareiaError::ConfigInvalid(_) => "config".to_string(),
            PenareiaError::Component { component, .. } => component.clone(),
            _ => "system".to_string(),
        }
    }
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, PenareiaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_formatting() {
        let capture_error = PenareiaError::Capture(CaptureError::BufferEmpty);
        assert_eq!(
            capture_error.to_string(),
            "Capture error: Buffer empty: no frames to snapshot"
        );
    }

    #[test]
    fn test_component_name_extraction() {
        assert_eq!(
            PenareiaError::Capture(CaptureError::BufferEmpty).component_name(),
            "capture"
        );
        assert_eq!(
            PenareiaError::Journal(JournalError::NotFound { id: 3 }).component_name(),
            "journal"
        );
        assert_eq!(PenareiaError::system("oops").component_name(), "system");
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(PenareiaError::Capture(CaptureError::SourceOpen {
            source_desc: "0".to_string()
        })
        .is_recoverable());
        assert!(!PenareiaError::Shutdown.is_recoverable());
        assert!(!PenareiaError::StallDetected { gap_seconds: 61 }.is_recoverable());
    }
}
