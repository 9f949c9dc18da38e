use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::actions::{self, ActionResponse};
use crate::feed;
use crate::page;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HitForm {
    pub shooter: String,
}

#[derive(Debug, Deserialize)]
pub struct ShooterForm {
    pub name: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    let screenshots = ServeDir::new(state.screenshots.dir());
    Router::new()
        .route("/", get(index))
        .route("/video_feed", get(video_feed))
        .route("/scores", get(scores))
        .route("/capture_background", post(capture_background))
        .route("/register_hit", post(register_hit))
        .route("/add_shooter", post(add_shooter))
        .route("/remove_shooter", post(remove_shooter))
        .route("/reset_scores", post(reset_scores))
        .nest_service("/screenshots", screenshots)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET / — control page
async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let shooters = state.scores().shooters().clone();
    Html(page::render_index(&shooters, state.background.exists()))
}

/// GET /video_feed — live MJPEG stream
async fn video_feed(State(state): State<Arc<AppState>>) -> Response {
    feed::mjpeg_response(&state.frames)
}

/// GET /scores — the score book as JSON
async fn scores(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let shooters = state.scores().shooters().clone();
    Json(shooters)
}

/// POST /capture_background
async fn capture_background(State(state): State<Arc<AppState>>) -> Json<ActionResponse> {
    match actions::capture_background(state).await {
        Ok(()) => Json(ActionResponse::ok()),
        Err(e) => {
            actions::log_failure("capture_background", &e);
            Json(ActionResponse::failed(e.to_string()))
        }
    }
}

/// POST /register_hit — form field `shooter`
async fn register_hit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<HitForm>,
) -> Json<ActionResponse> {
    let result = actions::register_hit(state, form.shooter).await;
    if let Err(e) = &result {
        actions::log_failure("register_hit", e);
    }
    Json(ActionResponse::from(result))
}

/// POST /add_shooter — form field `name`
async fn add_shooter(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ShooterForm>,
) -> Response {
    match actions::add_shooter(state, form.name).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(e) => failure_response("add_shooter", e),
    }
}

/// POST /remove_shooter — form field `name`
async fn remove_shooter(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ShooterForm>,
) -> Response {
    match actions::remove_shooter(state, form.name).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(e) => failure_response("remove_shooter", e),
    }
}

/// POST /reset_scores
async fn reset_scores(State(state): State<Arc<AppState>>) -> Response {
    match actions::reset_scores(state).await {
        Ok(removed) => {
            info!(screenshots_removed = removed, "scores reset");
            Redirect::to("/").into_response()
        }
        Err(e) => failure_response("reset_scores", e),
    }
}

fn failure_response(action: &str, e: actions::ActionError) -> Response {
    actions::log_failure(action, &e);
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
}
