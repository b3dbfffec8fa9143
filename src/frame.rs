use std::sync::Arc;
use std::time::SystemTime;

/// A single decoded frame captured from the camera.
///
/// Immutable after construction; cheaply cloneable (the pixel data is
/// `Arc`-shared) so the ring buffer and snapshot copies never duplicate bytes.
#[derive(Debug, Clone)]
pub struct FrameData {
    pub id: u64,
    pub timestamp: SystemTime,
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

impl FrameData {
    pub fn new(id: u64, timestamp: SystemTime, data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
        }
    }

    pub fn age_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.timestamp)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_data_creation() {
        let frame = FrameData::new(1, SystemTime::now(), vec![0u8; 128], 640, 480);
        assert_eq!(frame.id, 1);
        assert_eq!(frame.width, 640);
        assert_eq!(frame.height, 480);
        assert_eq!(frame.data.len(), 128);
    }

    #[test]
    fn test_frame_age() {
        let past = SystemTime::now() - std::time::Duration::from_millis(50);
        let frame = FrameData::new(1, past, vec![0u8; 4], 640, 480);
        assert!(frame.age_ms() >= 40);
    }
}
