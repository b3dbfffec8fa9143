//! Camera acquisition: source abstraction plus the resilient read loop.

pub mod loop_;
pub mod source;

pub use loop_::{ring_capacity, CaptureLoop, CaptureSessionInfo};
pub use source::{CameraSource, FfmpegCameraSource, MockCameraSource};
