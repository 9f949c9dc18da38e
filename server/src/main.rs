mod actions;
mod background;
mod feed;
mod page;
mod routes;
mod scores;
mod screenshots;
mod state;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use hitboard_capture::{start_camera, FrameSlot};
use hitboard_common::config::Config;
use hitboard_detector::{AnnotationStyle, DetectorParams};
use tracing::{error, info, warn};

use crate::background::BackgroundStore;
use crate::scores::ScoreBook;
use crate::screenshots::ScreenshotStore;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    let storage = &config.storage;
    let scores = match ScoreBook::load(&storage.scores_file) {
        Ok(book) => book,
        Err(e) => {
            error!(error = %e, "failed to load scores");
            std::process::exit(1);
        }
    };
    let screenshots = match ScreenshotStore::open(&storage.screenshots_dir, storage.jpeg_quality) {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "failed to open screenshot directory");
            std::process::exit(1);
        }
    };

    let annotation = &config.annotation;
    let mut style = AnnotationStyle::new(annotation.marker_radius, annotation.label_scale);
    if let Some(font_path) = &annotation.font_path {
        style = match style.with_font_file(font_path) {
            Ok(styled) => styled,
            Err(e) => {
                warn!(error = %e, "falling back to built-in label digits");
                AnnotationStyle::new(annotation.marker_radius, annotation.label_scale)
            }
        };
    }

    info!(
        marker_radius = annotation.marker_radius,
        font = style.has_font(),
        "annotation style ready"
    );

    let camera = match start_camera(&config.camera, FrameSlot::new()).await {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "could not open any camera backend");
            std::process::exit(1);
        }
    };
    info!(backend = camera.backend.as_str(), "camera ready");

    let state = Arc::new(AppState {
        frames: camera.slot.clone(),
        max_frame_age_ms: config.camera.max_frame_age_ms,
        scores: Mutex::new(scores),
        background: BackgroundStore::new(&storage.background_file),
        screenshots,
        params: DetectorParams {
            threshold: config.detection.threshold,
            min_area: config.detection.min_area,
        },
        style,
    });

    let app = routes::router(state);

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    info!(addr, "hitboard server starting");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap_or_else(|e| {
        eprintln!("Failed to bind to {addr}: {e}");
        std::process::exit(1);
    });

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await;

    if !camera.is_running() {
        warn!("camera task had already stopped");
    }
    camera.stop();

    match served {
        Ok(()) => info!("hitboard server stopped"),
        Err(e) => {
            error!(error = %e, "server error");
            std::process::exit(1);
        }
    }
}
