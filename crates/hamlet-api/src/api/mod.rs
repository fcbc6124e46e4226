//! Shared API plumbing: the response envelope and error mapping.
//!
//! Every route answers with the same JSON envelope
//! `{"status": "success"|"error", "message": ..., "data": ...}` so game-side
//! integrations can parse responses uniformly, including the 404 fallback.

pub mod agents;
pub mod sim;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hamlet_common::HamletError;
use hamlet_core::{
    AgentStore, DecisionDispatcher, LifecycleManager, LocationRegistry, TickScheduler,
    transport::DecisionBackend, world::local::LocalWorld,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<AgentStore>,
    pub lifecycle: Arc<LifecycleManager>,
    pub dispatcher: Arc<DecisionDispatcher>,
    pub scheduler: Arc<TickScheduler>,
    pub backend: Arc<dyn DecisionBackend>,
    pub world: Arc<LocalWorld>,
    pub locations: Arc<LocationRegistry>,
}

#[derive(Debug, Serialize)]
pub struct Envelope {
    pub status: &'static str,
    pub message: String,
    pub data: serde_json::Value,
}

pub fn success(message: impl Into<String>, data: serde_json::Value) -> Json<Envelope> {
    Json(Envelope {
        status: "success",
        message: message.into(),
        data,
    })
}

pub fn failure(code: StatusCode, message: impl Into<String>) -> Response {
    let body = Json(Envelope {
        status: "error",
        message: message.into(),
        data: serde_json::Value::Null,
    });
    (code, body).into_response()
}

/// HTTP status for each error in the taxonomy.
pub fn status_for(err: &HamletError) -> StatusCode {
    match err {
        HamletError::CapacityExceeded { .. }
        | HamletError::DuplicateId(_)
        | HamletError::AlreadyInProgress(_) => StatusCode::CONFLICT,
        HamletError::AgentNotFound(_)
        | HamletError::UnknownLocation(_)
        | HamletError::UnknownAgentTarget(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(err: HamletError) -> Response {
    failure(status_for(&err), err.to_string())
}

pub async fn fallback() -> Response {
    failure(StatusCode::NOT_FOUND, "no such route")
}
