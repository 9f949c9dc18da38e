//! Camera acquisition.
//!
//! Each backend runs as a background task that keeps a [`FrameSlot`] filled
//! with the most recent JPEG frame. [`start_camera`] tries the configured
//! backends in order and keeps the first one that delivers a frame.

pub mod helper;
pub mod mjpeg;
pub mod slot;
pub mod snapshot;

use std::time::Duration;

use hitboard_common::config::{BackendKind, CameraConfig};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub use slot::FrameSlot;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to spawn capture helper: {0}")]
    Spawn(String),
    #[error("capture helper unavailable: {0}")]
    HelperUnavailable(String),
    #[error("failed to read from capture helper: {0}")]
    HelperRead(String),
    #[error("capture helper exited with {0}")]
    HelperExited(String),
    #[error("HTTP connection failed: {0}")]
    HttpConnect(reqwest::Error),
    #[error("HTTP stream error: {0}")]
    HttpStream(reqwest::Error),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("no camera backend delivered a frame (tried: {0})")]
    NoBackend(String),
}

/// A running capture backend.
pub struct CameraHandle {
    pub backend: BackendKind,
    pub slot: FrameSlot,
    task: JoinHandle<()>,
}

impl CameraHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

/// Spawn one backend feeding `slot`. The task only returns on a setup error.
pub fn spawn_backend(kind: BackendKind, camera: &CameraConfig, slot: FrameSlot) -> JoinHandle<()> {
    let camera = camera.clone();
    tokio::spawn(async move {
        let result = match kind {
            BackendKind::Ffmpeg => {
                let spec = helper::HelperSpec::ffmpeg(
                    &camera.input_format,
                    &camera.device,
                    camera.capture_fps,
                );
                helper::run_helper_capture(spec, slot).await
            }
            BackendKind::Mjpeg => mjpeg::run_mjpeg_capture(&camera.stream_url, slot).await,
            BackendKind::Snapshot => {
                let interval = snapshot::poll_interval(camera.poll_fps);
                snapshot::run_snapshot_capture(&camera.snapshot_url, interval, slot).await
            }
        };
        if let Err(e) = result {
            error!(backend = kind.as_str(), error = %e, "capture backend stopped");
        }
    })
}

enum Startup {
    Delivered(usize),
    TimedOut,
    Exited,
}

/// Start the first backend, in configured order, that delivers a frame within
/// `startup_timeout_secs`. Backends that fail are aborted before the next one
/// is tried.
pub async fn start_camera(camera: &CameraConfig, slot: FrameSlot) -> Result<CameraHandle, CaptureError> {
    let timeout = Duration::from_secs(camera.startup_timeout_secs);
    let mut tried = Vec::new();

    for &kind in &camera.backends {
        tried.push(kind.as_str());
        info!(backend = kind.as_str(), timeout_secs = camera.startup_timeout_secs, "trying camera backend");

        let mut task = spawn_backend(kind, camera, slot.clone());
        let startup = tokio::select! {
            frame = slot.wait_for_frame(timeout) => match frame {
                Some(frame) => Startup::Delivered(frame.jpeg.len()),
                None => Startup::TimedOut,
            },
            _ = &mut task => Startup::Exited,
        };

        match startup {
            Startup::Delivered(bytes) => {
                info!(backend = kind.as_str(), bytes, "camera backend delivered first frame");
                return Ok(CameraHandle { backend: kind, slot, task });
            }
            Startup::TimedOut => {
                warn!(backend = kind.as_str(), "no frame before timeout, trying next backend");
                task.abort();
            }
            Startup::Exited => {
                warn!(backend = kind.as_str(), "backend exited before delivering a frame");
            }
        }
    }

    Err(CaptureError::NoBackend(tried.join(", ")))
}
