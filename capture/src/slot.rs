use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use hitboard_common::frame::CapturedFrame;
use tokio::sync::watch;

/// Single-slot holder for the most recent camera frame.
///
/// Capture backends overwrite the slot; readers clone whatever is current.
/// Clones of `FrameSlot` share the same slot.
#[derive(Clone)]
pub struct FrameSlot {
    tx: Arc<watch::Sender<Option<CapturedFrame>>>,
    seq: Arc<AtomicU64>,
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSlot {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Stamp a freshly captured JPEG and make it the latest frame.
    pub fn publish(&self, jpeg: Bytes) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let frame = CapturedFrame::new(jpeg, Utc::now().timestamp_millis(), seq);
        self.tx.send_replace(Some(frame));
        seq
    }

    /// Replace the latest frame as-is.
    pub fn put(&self, frame: CapturedFrame) {
        self.tx.send_replace(Some(frame));
    }

    pub fn latest(&self) -> Option<CapturedFrame> {
        self.tx.borrow().clone()
    }

    /// The latest frame, unless it is older than `max_age_ms`.
    pub fn fresh(&self, max_age_ms: i64) -> Option<CapturedFrame> {
        let now = Utc::now().timestamp_millis();
        self.latest().filter(|f| f.age_ms(now) <= max_age_ms)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<CapturedFrame>> {
        self.tx.subscribe()
    }

    /// Wait until the slot holds a frame, up to `timeout`.
    pub async fn wait_for_frame(&self, timeout: Duration) -> Option<CapturedFrame> {
        let mut rx = self.subscribe();
        // Bound first so the borrow of `rx` ends before `rx` is dropped.
        let frame = match tokio::time::timeout(timeout, rx.wait_for(|f| f.is_some())).await {
            Ok(Ok(frame)) => (*frame).clone(),
            _ => None,
        };
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slot_has_no_frame() {
        let slot = FrameSlot::new();
        assert!(slot.latest().is_none());
        assert!(slot.fresh(1_000).is_none());
    }

    #[test]
    fn latest_write_wins() {
        let slot = FrameSlot::new();
        slot.publish(Bytes::from_static(b"first"));
        slot.publish(Bytes::from_static(b"second"));
        let frame = slot.latest().unwrap();
        assert_eq!(&frame.jpeg[..], b"second");
        assert_eq!(frame.seq, 1);
    }

    #[test]
    fn clones_share_the_slot() {
        let slot = FrameSlot::new();
        let writer = slot.clone();
        writer.publish(Bytes::from_static(b"x"));
        assert!(slot.latest().is_some());
    }

    #[test]
    fn stale_frame_is_not_fresh() {
        let slot = FrameSlot::new();
        let old = Utc::now().timestamp_millis() - 10_000;
        slot.put(CapturedFrame::new(Bytes::from_static(b"old"), old, 0));
        assert!(slot.fresh(2_000).is_none());
        assert!(slot.fresh(20_000).is_some());
    }

    #[tokio::test]
    async fn wait_times_out_without_frames() {
        let slot = FrameSlot::new();
        assert!(slot.wait_for_frame(Duration::from_millis(20)).await.is_none());
    }

    #[tokio::test]
    async fn wait_sees_frame_published_later() {
        let slot = FrameSlot::new();
        let writer = slot.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            writer.publish(Bytes::from_static(b"late"));
        });
        let frame = slot.wait_for_frame(Duration::from_secs(2)).await.unwrap();
        assert_eq!(&frame.jpeg[..], b"late");
    }
}
