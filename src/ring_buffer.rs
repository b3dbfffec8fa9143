use crate::frame::FrameData;
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Fixed-capacity circular buffer of decoded frames.
///
/// A single `Mutex<VecDeque<FrameData>>` rather than a per-slot
/// `RwLock<Option<FrameData>>` array: append and snapshot both take
/// the same lock for their whole duration, so a snapshot can never observe a
/// frame whose append has not returned (sequential consistency). Triggers are
/// rare enough that the O(n) snapshot copy briefly blocking appends is an
/// acceptable tradeoff.
pub struct RingBuffer {
    inner: Mutex<VecDeque<FrameData>>,
    capacity: usize,
}

impl RingBuffer {
    /// Create a ring buffer with the given capacity.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        if capacity == 0 {
            panic!("Ring buffer capacity must be greater than 0");
        }

        debug!("Created ring buffer with capacity {}", capacity);

        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append a frame, evicting the oldest frame if the ring is full.
    pub async fn append(&self, frame: FrameData) {
        let mut guard = self.inner.lock().await;
        if guard.len() == self.capacity {
            guard.pop_front();
            trace!("Ring buffer overrun, evicted oldest frame");
        }
        guard.push_back(frame);
    }

    /// Return an independent copy of the newest `n` frames, oldest first.
    ///
    /// Returns fewer than `n` frames if the ring has not yet filled that far.
    pub async fn snapshot_tail(&self, n: usize) -> Vec<FrameData> {
        let guard = self.inner.lock().await;
        let len = guard.len();
        let skip = len.saturating_sub(n);
        let snapshot: Vec<FrameData> = guard.iter().skip(skip).cloned().collect();
        debug!("Snapshot tail of {} requested, returned {}", n, snapshot.len());
        snapshot
    }

    /// Current number of frames held (best-effort; may change immediately after return).
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Capacity needed to hold `seconds * fps` frames, minimum 1.
pub fn capacity_for(seconds: u32, fps: u32) -> usize {
    ((seconds as u64 * fps as u64) as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn frame(id: u64) -> FrameData {
        FrameData::new(id, SystemTime::now(), vec![0u8; 16], 640, 480)
    }

    #[tokio::test]
    async fn test_append_and_len() {
        let ring = RingBuffer::new(4);
        for i in 0..3 {
            ring.append(frame(i)).await;
        }
        assert_eq!(ring.len().await, 3);
    }

    #[tokio::test]
    async fn test_eviction_on_overflow() {
        let ring = RingBuffer::new(3);
        for i in 0..5 {
            ring.append(frame(i)).await;
        }
        assert_eq!(ring.len().await, 3);
        let tail = ring.snapshot_tail(3).await;
        assert_eq!(tail.iter().map(|f| f.id).collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_snapshot_tail_preserves_order() {
        let ring = RingBuffer::new(10);
        for i in 0..7 {
            ring.append(frame(i)).await;
        }
        let tail = ring.snapshot_tail(4).await;
        assert_eq!(tail.iter().map(|f| f.id).collect::<Vec<_>>(), vec![3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_snapshot_tail_fewer_than_requested() {
        let ring = RingBuffer::new(10);
        for i in 0..2 {
            ring.append(frame(i)).await;
        }
        let tail = ring.snapshot_tail(10).await;
        assert_eq!(tail.len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_on_empty_buffer() {
        let ring = RingBuffer::new(5);
        let tail = ring.snapshot_tail(5).await;
        assert!(tail.is_empty());
        assert!(ring.is_empty().await);
    }

    #[test]
    #[should_panic(expected = "capacity must be greater than 0")]
    fn test_zero_capacity_panics() {
        RingBuffer::new(0);
    }

    #[test]
    fn test_capacity_for_rounds_up() {
        assert_eq!(capacity_for(10, 24), 240);
        assert_eq!(capacity_for(1, 1), 1);
        assert_eq!(capacity_for(0, 30), 1);
    }
}
