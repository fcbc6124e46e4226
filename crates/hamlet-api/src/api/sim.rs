//! Scheduler control endpoints.

use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;

use super::{AppState, error_response, success};

pub async fn status(State(state): State<AppState>) -> Response {
    success(
        "scheduler status",
        json!({
            "state": state.scheduler.state().await.to_string(),
            "ticks": state.scheduler.ticks(),
        }),
    )
    .into_response()
}

pub async fn tick(State(state): State<AppState>) -> Response {
    state.scheduler.trigger_tick().await;
    success(
        "tick triggered",
        json!({ "state": state.scheduler.state().await.to_string() }),
    )
    .into_response()
}

pub async fn pause(State(state): State<AppState>) -> Response {
    match state.scheduler.pause().await {
        Ok(()) => success("scheduler paused", json!({})).into_response(),
        Err(err) => error_response(err),
    }
}

pub async fn resume(State(state): State<AppState>) -> Response {
    match state.scheduler.resume().await {
        Ok(()) => success("scheduler resumed", json!({})).into_response(),
        Err(err) => error_response(err),
    }
}

pub async fn stop(State(state): State<AppState>) -> Response {
    state.scheduler.stop().await;
    success("scheduler stopped", json!({})).into_response()
}

pub fn sim_routes(state: AppState) -> Router {
    Router::new()
        .route("/sim/status", get(status))
        .route("/sim/tick", post(tick))
        .route("/sim/pause", post(pause))
        .route("/sim/resume", post(resume))
        .route("/sim/stop", post(stop))
        .with_state(state)
}
