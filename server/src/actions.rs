//! Operations behind the HTTP routes, independent of axum extractors.

use std::sync::Arc;

use chrono::{DateTime, Local};
use hitboard_detector::{annotate_hits, detect_hits, DetectError};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::background::BackgroundError;
use crate::scores::ScoreError;
use crate::screenshots::ScreenshotError;
use crate::state::AppState;

/// JSON body returned by the action endpoints.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hits: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("unknown shooter")]
    UnknownShooter,
    #[error("No background set")]
    NoBackground,
    #[error("Failed to capture picture")]
    CaptureFailed,
    #[error("No hits detected")]
    NoHits,
    #[error(transparent)]
    Background(#[from] BackgroundError),
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error(transparent)]
    Screenshot(#[from] ScreenshotError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A successful hit registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scored {
    pub filename: String,
    pub score: u64,
    pub hits: usize,
}

impl From<Result<Scored, ActionError>> for ActionResponse {
    fn from(result: Result<Scored, ActionError>) -> Self {
        match result {
            Ok(scored) => Self {
                success: true,
                filename: Some(scored.filename),
                score: Some(scored.score),
                hits: Some(scored.hits),
                error: None,
            },
            // Unknown shooters get a bare failure flag.
            Err(ActionError::UnknownShooter) => Self::default(),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

/// Store the current camera frame as the new background.
pub async fn capture_background(state: Arc<AppState>) -> Result<(), ActionError> {
    let frame = state.current_frame().ok_or(ActionError::CaptureFailed)?;
    tokio::task::spawn_blocking(move || -> Result<(), ActionError> {
        // Refuse frames that would make every later comparison fail.
        frame.decode_rgb().map_err(|e| {
            warn!(error = %e, seq = frame.seq, "captured frame does not decode");
            ActionError::CaptureFailed
        })?;
        state.background.save(&frame)?;
        Ok(())
    })
    .await?
}

/// Compare the current frame against the background and score any hits.
pub async fn register_hit(state: Arc<AppState>, shooter: String) -> Result<Scored, ActionError> {
    let now = Local::now();
    tokio::task::spawn_blocking(move || register_hit_blocking(&state, &shooter, now)).await?
}

fn register_hit_blocking(
    state: &AppState,
    shooter: &str,
    now: DateTime<Local>,
) -> Result<Scored, ActionError> {
    if !state.scores().contains(shooter) {
        return Err(ActionError::UnknownShooter);
    }
    let background = state.background.load()?.ok_or(ActionError::NoBackground)?;
    let frame = state.current_frame().ok_or(ActionError::CaptureFailed)?;
    let mut image = frame.decode_rgb().map_err(|e| {
        warn!(error = %e, seq = frame.seq, "captured frame does not decode");
        ActionError::CaptureFailed
    })?;

    let hits = detect_hits(&background, &image, &state.params)?;
    if hits.is_empty() {
        info!(shooter, seq = frame.seq, "no hits detected");
        return Err(ActionError::NoHits);
    }

    annotate_hits(&mut image, &hits, &state.style);
    let filename = state.screenshots.save_new(shooter, now, &image)?;

    // A screenshot must never outlive a failed score update.
    let recorded = state
        .scores()
        .record_hits(shooter, hits.len() as u64, filename.clone());
    match recorded {
        Ok(Some(score)) => {
            info!(shooter, hits = hits.len(), score, filename, "hits registered");
            Ok(Scored {
                filename,
                score,
                hits: hits.len(),
            })
        }
        Ok(None) => {
            state.screenshots.remove(&filename);
            Err(ActionError::UnknownShooter)
        }
        Err(e) => {
            state.screenshots.remove(&filename);
            Err(e.into())
        }
    }
}

pub async fn add_shooter(state: Arc<AppState>, name: String) -> Result<bool, ActionError> {
    tokio::task::spawn_blocking(move || -> Result<bool, ActionError> {
        Ok(state.scores().add_shooter(&name)?)
    })
    .await?
}

pub async fn remove_shooter(state: Arc<AppState>, name: String) -> Result<bool, ActionError> {
    tokio::task::spawn_blocking(move || -> Result<bool, ActionError> {
        Ok(state.scores().remove_shooter(&name)?)
    })
    .await?
}

/// Zero all scores and delete every screenshot. Returns the number of files removed.
pub async fn reset_scores(state: Arc<AppState>) -> Result<usize, ActionError> {
    tokio::task::spawn_blocking(move || -> Result<usize, ActionError> {
        state.scores().reset()?;
        Ok(state.screenshots.clear()?)
    })
    .await?
}

/// Log a failed action the way every handler does.
pub fn log_failure(action: &str, e: &ActionError) {
    match e {
        ActionError::UnknownShooter | ActionError::NoBackground | ActionError::NoHits => {
            info!(action, reason = %e, "action declined");
        }
        ActionError::CaptureFailed => warn!(action, "no fresh camera frame"),
        _ => error!(action, error = %e, "action failed"),
    }
}
