use std::sync::{Mutex, MutexGuard};

use hitboard_capture::FrameSlot;
use hitboard_common::frame::CapturedFrame;
use hitboard_detector::{AnnotationStyle, DetectorParams};

use crate::background::BackgroundStore;
use crate::scores::ScoreBook;
use crate::screenshots::ScreenshotStore;

pub struct AppState {
    pub frames: FrameSlot,
    pub max_frame_age_ms: i64,
    pub scores: Mutex<ScoreBook>,
    pub background: BackgroundStore,
    pub screenshots: ScreenshotStore,
    pub params: DetectorParams,
    pub style: AnnotationStyle,
}

impl AppState {
    /// The score book. A panic while holding the lock cannot leave a record
    /// half-written, so a poisoned lock is recovered.
    pub fn scores(&self) -> MutexGuard<'_, ScoreBook> {
        self.scores.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The latest camera frame if it is recent enough to count as a capture.
    pub fn current_frame(&self) -> Option<CapturedFrame> {
        self.frames.fresh(self.max_frame_age_ms)
    }
}
