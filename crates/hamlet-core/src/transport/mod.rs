//! Transport layer for the decision backend
//!
//! The backend is an opaque HTTP service speaking JSON. [`DecisionBackend`]
//! is the seam the dispatcher and scheduler program against; [`BackendClient`]
//! is the production implementation over reqwest. Tests substitute scripted
//! implementations of the trait.

pub mod client;

pub use client::BackendClient;

use async_trait::async_trait;
use hamlet_common::Result;
use serde::{Deserialize, Serialize};

/// One decision request, built fresh per tick and never mutated after
/// dispatch.
///
/// `system_prompt` is included only on an agent's first request; the
/// per-agent flag lives on the agent record.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRequest {
    pub agent_id: String,
    /// Feedback snapshot: the agent's own state plus nearby entities
    pub user_input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
}

/// The backend's answer to a decision request.
///
/// `text` holds the full natural-language reasoning; only its last
/// non-empty line carries the action grammar (see [`crate::decision`]).
#[derive(Debug, Clone, Deserialize)]
pub struct DecisionResponse {
    pub agent_id: String,
    pub text: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub location: String,
}

/// Body for `POST /agent/register`.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterAgentRequest {
    pub agent_id: String,
    pub initial_location: String,
}

/// Body for `POST /agents/prime` — the cold-start handshake.
#[derive(Debug, Clone, Serialize)]
pub struct PrimeRequest {
    pub agent_ids: Vec<String>,
    pub force: bool,
}

/// Body for `POST /profiles/{id}` — single-agent profile priming.
#[derive(Debug, Clone, Serialize)]
pub struct PrimeProfileRequest {
    pub force: bool,
}

/// Aggregated world view pushed to the backend via `POST /env/update`.
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentUpdate {
    pub timestamp: i64,
    pub agents: Vec<AgentSnapshot>,
}

/// One agent's slice of an [`EnvironmentUpdate`].
#[derive(Debug, Clone, Serialize)]
pub struct AgentSnapshot {
    pub agent_id: String,
    pub location: String,
    pub status: String,
}

/// The seam between the orchestration loop and the remote backend.
#[async_trait]
pub trait DecisionBackend: Send + Sync {
    /// Register an agent with the backend. Best-effort from the caller's
    /// point of view; local state stays authoritative on failure.
    async fn register_agent(&self, agent_id: &str, initial_location: &str) -> Result<()>;

    /// Remove an agent from the backend.
    async fn deregister_agent(&self, agent_id: &str) -> Result<()>;

    /// Request one decision for one agent.
    async fn generate(&self, request: &DecisionRequest) -> Result<DecisionResponse>;

    /// Cold-start handshake for a batch of agents. Must succeed before the
    /// scheduler trusts real decision requests.
    async fn prime(&self, agent_ids: &[String], force: bool) -> Result<()>;

    /// Prime a single agent's profile, for agents that join after the
    /// batch handshake.
    async fn prime_profile(&self, agent_id: &str, force: bool) -> Result<()>;

    /// Liveness probe; any 2xx counts as connected.
    async fn health(&self) -> Result<()>;

    /// Push an aggregated environment snapshot.
    async fn push_environment(&self, update: &EnvironmentUpdate) -> Result<()>;

    /// Current connectivity as of the last completed request.
    fn is_connected(&self) -> bool;
}
