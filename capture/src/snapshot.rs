use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::slot::FrameSlot;
use crate::CaptureError;

/// Polling fallback: periodically fetch single JPEG frames.
pub async fn run_snapshot_capture(
    frame_url: &str,
    interval: Duration,
    slot: FrameSlot,
) -> Result<(), CaptureError> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(CaptureError::HttpConnect)?;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match client.get(frame_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.bytes().await {
                Ok(jpeg) if !jpeg.is_empty() => {
                    let bytes = jpeg.len();
                    let seq = slot.publish(jpeg);
                    debug!(seq, bytes, "captured snapshot frame");
                }
                Ok(_) => {
                    warn!("camera returned an empty snapshot");
                }
                Err(e) => {
                    warn!(error = %e, "failed to read snapshot body");
                }
            },
            Ok(resp) => {
                warn!(status = %resp.status(), "non-success response from camera");
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch camera frame");
            }
        }
    }
}

/// Poll interval for a target rate, clamped to at most 100 polls per second.
pub fn poll_interval(fps: f64) -> Duration {
    Duration::from_secs_f64(1.0 / fps.clamp(0.01, 100.0))
}
