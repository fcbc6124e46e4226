//! Agent lifecycle and action endpoints.

use axum::{
    Router,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use hamlet_common::WorldPosition;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{AppState, error_response, failure, success};

/// Registration body. Field names are camelCase on the wire.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    pub agent_id: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub initial_location: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveBody {
    pub location: String,
}

#[derive(Debug, Deserialize)]
pub struct SpeakBody {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseBody {
    pub target_agent: String,
}

pub async fn health(State(state): State<AppState>) -> Response {
    let backend_ok = state.backend.health().await.is_ok();
    success(
        "ok",
        json!({
            "backendConnected": state.backend.is_connected(),
            "backendHealthy": backend_ok,
            "agents": state.store.len().await,
        }),
    )
    .into_response()
}

pub async fn register(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<RegisterBody>,
) -> Response {
    if body.agent_id.trim().is_empty() {
        return failure(axum::http::StatusCode::BAD_REQUEST, "agentId is required");
    }

    if let Err(err) = state
        .lifecycle
        .create_agent(&body.agent_id, &body.personality, &body.initial_location)
        .await
    {
        return error_response(err);
    }

    // Place the agent in the world at its starting location; an unknown
    // name means the origin.
    let spawn_at = state
        .locations
        .resolve(&body.initial_location)
        .await
        .unwrap_or(WorldPosition::new(0.0, 0.0, 0.0));
    state.world.spawn_agent(&body.agent_id, spawn_at).await;

    info!(agent_id = %body.agent_id, "agent registered via API");
    success(
        "agent registered",
        json!({ "agentId": body.agent_id, "location": body.initial_location }),
    )
    .into_response()
}

pub async fn deregister(State(state): State<AppState>, Path(agent_id): Path<String>) -> Response {
    if !state.lifecycle.remove_agent(&agent_id).await {
        return failure(
            axum::http::StatusCode::NOT_FOUND,
            format!("no agent named {}", agent_id),
        );
    }
    state.world.remove_agent(&agent_id).await;
    success("agent deregistered", json!({ "agentId": agent_id })).into_response()
}

pub async fn move_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    axum::Json(body): axum::Json<MoveBody>,
) -> Response {
    match state.dispatcher.apply_move(&agent_id, &body.location).await {
        Ok(()) => success(
            "move dispatched",
            json!({ "agentId": agent_id, "location": body.location }),
        )
        .into_response(),
        Err(err) => error_response(err),
    }
}

pub async fn speak(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    axum::Json(body): axum::Json<SpeakBody>,
) -> Response {
    match state.dispatcher.speak(&agent_id, &body.message).await {
        Ok(()) => success("speech displayed", json!({ "agentId": agent_id })).into_response(),
        Err(err) => error_response(err),
    }
}

pub async fn converse(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    axum::Json(body): axum::Json<ConverseBody>,
) -> Response {
    match state.dispatcher.converse(&agent_id, &body.target_agent).await {
        Ok(()) => success(
            "conversation started",
            json!({ "agentId": agent_id, "targetAgent": body.target_agent }),
        )
        .into_response(),
        Err(err) => error_response(err),
    }
}

pub async fn environment(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Response {
    match state.dispatcher.environment_for(&agent_id).await {
        Ok(env) => match serde_json::to_value(&env) {
            Ok(data) => success("environment snapshot", data).into_response(),
            Err(err) => failure(
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
            ),
        },
        Err(err) => error_response(err),
    }
}

pub fn agent_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/agent/register", post(register))
        .route("/agent/:id/deregister", post(deregister))
        .route("/agent/:id/move", post(move_agent))
        .route("/agent/:id/speak", post(speak))
        .route("/agent/:id/converse", post(converse))
        .route("/env/:agent_id", get(environment))
        .with_state(state)
}
