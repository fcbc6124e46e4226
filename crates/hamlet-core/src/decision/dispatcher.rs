//! Decision dispatch and action application
//!
//! For each agent, the dispatcher builds a feedback snapshot (own state plus
//! nearby entities), asks the backend for a decision, and applies the
//! returned action exactly once. All per-agent failures are absorbed here
//! and logged; nothing propagates to the tick scheduler. The agent may have
//! been deregistered by the time a response resolves, so every completion
//! re-checks existence before touching state.

use crate::agents::AgentStore;
use crate::decision::grammar::{self, DecisionAction};
use crate::transport::{AgentSnapshot, DecisionBackend, DecisionRequest, EnvironmentUpdate};
use crate::world::{
    ArrivalEvent, LocationRegistry, MovementSystem, NearbyReport, Perception, Presentation,
};
use hamlet_common::{
    DEFAULT_SPEECH_DURATION_SECS, HamletError, Result, SimulationConfig, current_timestamp_secs,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What `GET /env/{agent_id}` reports: the agent's record plus what it sees.
#[derive(Debug, Clone, Serialize)]
pub struct AgentEnvironment {
    pub agent: crate::agents::AgentRecord,
    pub nearby: NearbyReport,
}

pub struct DecisionDispatcher {
    store: Arc<AgentStore>,
    backend: Arc<dyn DecisionBackend>,
    movement: Arc<dyn MovementSystem>,
    perception: Arc<dyn Perception>,
    presentation: Arc<dyn Presentation>,
    locations: Arc<LocationRegistry>,
    config: SimulationConfig,
}

impl DecisionDispatcher {
    pub fn new(
        store: Arc<AgentStore>,
        backend: Arc<dyn DecisionBackend>,
        movement: Arc<dyn MovementSystem>,
        perception: Arc<dyn Perception>,
        presentation: Arc<dyn Presentation>,
        locations: Arc<LocationRegistry>,
        config: SimulationConfig,
    ) -> Self {
        Self {
            store,
            backend,
            movement,
            perception,
            presentation,
            locations,
            config,
        }
    }

    /// Request and apply one decision for one agent.
    ///
    /// Failures never escape: a timed-out or malformed decision leaves the
    /// agent with its prior state and it is simply included in the next
    /// tick's wave.
    pub async fn request_decision(&self, agent_id: &str) {
        if !self.backend.is_connected() {
            debug!(agent_id = %agent_id, "backend disconnected, skipping decision request");
            return;
        }
        let Some(record) = self.store.get(agent_id).await else {
            debug!(agent_id = %agent_id, "decision requested for unregistered agent, skipping");
            return;
        };

        let (location, status, personality, partner, rounds, first_request) = {
            let r = record.read().await;
            (
                r.location.clone(),
                r.status.clone(),
                r.personality.clone(),
                r.conversation_partner_id.clone(),
                r.conversation_rounds_remaining,
                !r.system_prompt_sent,
            )
        };

        let report = self.perception.nearby(agent_id).await;
        let user_input =
            build_user_input(agent_id, &location, &status, &report, partner.as_deref(), rounds);

        let system_prompt = first_request.then(|| system_prompt_for(agent_id, &personality));

        let request = DecisionRequest {
            agent_id: agent_id.to_string(),
            user_input,
            system_prompt,
            task: None,
        };

        let response = match self.backend.generate(&request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(agent_id = %agent_id, error = %err, "decision request failed, keeping prior state");
                return;
            }
        };

        // The profile rode along and the backend saw it; only now does the
        // flag flip, so a failed first request re-sends the prompt.
        if first_request {
            record.write().await.system_prompt_sent = true;
        }

        // The agent may no longer exist by the time this resolves.
        if !self.store.contains(agent_id).await {
            debug!(agent_id = %agent_id, "agent removed while decision was in flight, dropping response");
            return;
        }

        for line in grammar::reasoning_lines(&response.text) {
            debug!(agent_id = %agent_id, "reasoning: {}", line);
        }

        match grammar::parse_decision(&response.text) {
            Ok(DecisionAction::Move(target)) => {
                if let Err(err) = self.apply_move(agent_id, &target).await {
                    info!(agent_id = %agent_id, target = %target, error = %err, "move not applied");
                }
            }
            Ok(DecisionAction::Nothing) => {
                self.set_status(agent_id, "taking it easy").await;
            }
            Ok(DecisionAction::Converse(target)) => {
                if let Err(err) = self.converse(agent_id, &target).await {
                    info!(agent_id = %agent_id, target = %target, error = %err, "converse not applied");
                }
            }
            Err(err) => {
                warn!(agent_id = %agent_id, error = %err, "decision failed the action grammar");
                self.set_status(agent_id, "couldn't act on an unrecognized decision")
                    .await;
            }
        }

        self.advance_conversation(agent_id).await;
    }

    /// Start moving an agent toward a known location or another agent.
    ///
    /// A second move while one is in flight is rejected, not queued; the
    /// original destination stays. Moving away ends any conversation.
    pub async fn apply_move(&self, agent_id: &str, target: &str) -> Result<()> {
        let record = self
            .store
            .get(agent_id)
            .await
            .ok_or_else(|| HamletError::AgentNotFound(agent_id.to_string()))?;

        {
            let r = record.read().await;
            if r.is_moving && !r.desired_location.is_empty() {
                return Err(HamletError::AlreadyInProgress(format!(
                    "move for {}", agent_id
                )));
            }
        }

        let position = match self.locations.resolve(target).await {
            Some(position) => position,
            None => {
                // Not a known place: treat the target as an agent id and
                // head for its last known position. Staleness is accepted;
                // the target may have moved since this lookup.
                let agent_position = if self.store.contains(target).await {
                    self.movement.position_of(target).await
                } else {
                    None
                };
                match agent_position {
                    Some(position) => position,
                    None => {
                        self.set_status(
                            agent_id,
                            &format!("Move failed: no place or agent named {}", target),
                        )
                        .await;
                        return Err(HamletError::UnknownLocation(target.to_string()));
                    }
                }
            }
        };

        if !self.movement.move_to(agent_id, position).await {
            self.set_status(agent_id, "Move failed: movement unavailable")
                .await;
            return Err(HamletError::Generic(format!(
                "movement subsystem does not track {}",
                agent_id
            )));
        }

        // Walking off ends the conversation for both sides.
        let partner = record.read().await.conversation_partner_id.clone();
        if let Some(partner_id) = partner {
            self.end_conversation_pair(agent_id, &partner_id).await;
        }

        {
            let mut r = record.write().await;
            r.begin_move(target);
        }
        self.push_status(agent_id).await;
        info!(agent_id = %agent_id, target = %target, "move dispatched");
        Ok(())
    }

    /// Establish (or re-affirm) a conversation between two agents.
    ///
    /// Idempotent for an already-active identical partner. A target that is
    /// missing or out of proximity is a feedback-only failure.
    pub async fn converse(&self, agent_id: &str, target: &str) -> Result<()> {
        let record = self
            .store
            .get(agent_id)
            .await
            .ok_or_else(|| HamletError::AgentNotFound(agent_id.to_string()))?;

        {
            let r = record.read().await;
            if r.is_in_conversation && r.conversation_partner_id.as_deref() == Some(target) {
                debug!(agent_id = %agent_id, target = %target, "already conversing with that partner, no-op");
                return Ok(());
            }
        }

        let reachable = target != agent_id
            && self.store.contains(target).await
            && match (
                self.movement.position_of(agent_id).await,
                self.movement.position_of(target).await,
            ) {
                (Some(me), Some(them)) => me.distance_to(&them) <= self.config.converse_radius,
                _ => false,
            };

        if !reachable {
            self.set_status(
                agent_id,
                &format!("Converse failed: no agent named {} nearby", target),
            )
            .await;
            return Err(HamletError::UnknownAgentTarget(target.to_string()));
        }

        let Some(target_record) = self.store.get(target).await else {
            return Err(HamletError::UnknownAgentTarget(target.to_string()));
        };

        // Detach any previous partners before re-pairing.
        let old = record.read().await.conversation_partner_id.clone();
        if let Some(old_partner) = old {
            self.end_conversation_pair(agent_id, &old_partner).await;
        }
        let old = target_record.read().await.conversation_partner_id.clone();
        if let Some(old_partner) = old {
            self.end_conversation_pair(target, &old_partner).await;
        }

        let rounds = self.config.conversation_rounds;
        record.write().await.begin_conversation(target, rounds);
        target_record.write().await.begin_conversation(agent_id, rounds);

        self.push_status(agent_id).await;
        self.push_status(target).await;
        // Forward a conversation-opening line to the partner's side.
        self.presentation
            .display_speech(
                agent_id,
                &format!("Hey {}, got a minute?", target),
                DEFAULT_SPEECH_DURATION_SECS,
            )
            .await;
        info!(agent_id = %agent_id, target = %target, rounds, "conversation started");
        Ok(())
    }

    /// Display a line of speech for an agent.
    pub async fn speak(&self, agent_id: &str, message: &str) -> Result<()> {
        if !self.store.contains(agent_id).await {
            return Err(HamletError::AgentNotFound(agent_id.to_string()));
        }
        self.presentation
            .display_speech(agent_id, message, DEFAULT_SPEECH_DURATION_SECS)
            .await;
        Ok(())
    }

    /// Consume a movement-completion signal.
    pub async fn handle_arrival(&self, event: &ArrivalEvent) {
        if self.store.complete_move(&event.agent_id).await {
            self.push_status(&event.agent_id).await;
        }
    }

    /// Snapshot of one agent and its surroundings.
    pub async fn environment_for(&self, agent_id: &str) -> Result<AgentEnvironment> {
        let record = self
            .store
            .get(agent_id)
            .await
            .ok_or_else(|| HamletError::AgentNotFound(agent_id.to_string()))?;
        let agent = record.read().await.clone();
        let nearby = self.perception.nearby(agent_id).await;
        Ok(AgentEnvironment { agent, nearby })
    }

    /// Aggregated fleet snapshot for the periodic `POST /env/update` push.
    pub async fn environment_update(&self) -> EnvironmentUpdate {
        let mut agents = Vec::new();
        for agent_id in self.store.ids_in_order().await {
            if let Some(record) = self.store.get(&agent_id).await {
                let r = record.read().await;
                agents.push(AgentSnapshot {
                    agent_id: r.agent_id.clone(),
                    location: r.location.clone(),
                    status: r.status.clone(),
                });
            }
        }
        EnvironmentUpdate {
            timestamp: current_timestamp_secs(),
            agents,
        }
    }

    /// Count one conversational turn; hitting zero ends the conversation
    /// symmetrically for both partners.
    async fn advance_conversation(&self, agent_id: &str) {
        let Some(record) = self.store.get(agent_id).await else {
            return;
        };
        let ended_with = {
            let mut r = record.write().await;
            if !r.is_in_conversation {
                return;
            }
            r.conversation_rounds_remaining = r.conversation_rounds_remaining.saturating_sub(1);
            if r.conversation_rounds_remaining > 0 {
                return;
            }
            r.conversation_partner_id.clone()
        };
        if let Some(partner_id) = ended_with {
            self.end_conversation_pair(agent_id, &partner_id).await;
            info!(agent_id = %agent_id, partner = %partner_id, "conversation ran out of rounds");
        }
    }

    /// Clear both halves of a pairing in one step.
    async fn end_conversation_pair(&self, a: &str, b: &str) {
        if let Some(record) = self.store.get(a).await {
            record.write().await.end_conversation();
        }
        if let Some(record) = self.store.get(b).await {
            record.write().await.end_conversation();
        }
        self.push_status(a).await;
        self.push_status(b).await;
    }

    /// Set an agent's feedback string and mirror it to the presentation.
    async fn set_status(&self, agent_id: &str, text: &str) {
        if let Some(record) = self.store.get(agent_id).await {
            record.write().await.status = text.to_string();
        }
        self.presentation.update_status(agent_id, text).await;
    }

    /// Mirror the record's current status to the presentation.
    async fn push_status(&self, agent_id: &str) {
        if let Some(record) = self.store.get(agent_id).await {
            let status = record.read().await.status.clone();
            self.presentation.update_status(agent_id, &status).await;
        }
    }
}

/// The system prompt injected on an agent's first request.
fn system_prompt_for(agent_id: &str, personality: &str) -> String {
    format!(
        "You are {}, a resident of a small simulated town. {}\n\
         Each turn, reason briefly and end your reply with exactly one line:\n\
         MOVE: <place or agent name>\n\
         CONVERSE: <agent name>\n\
         NOTHING:",
        agent_id, personality
    )
}

/// The feedback snapshot sent as `user_input`.
///
/// Entities tagged "Default" are placement scaffolding and are left out of
/// the narration.
fn build_user_input(
    agent_id: &str,
    location: &str,
    status: &str,
    report: &NearbyReport,
    partner: Option<&str>,
    rounds: u32,
) -> String {
    let mut out = format!("You are {} at {}. Status: {}.", agent_id, location, status);

    let agents: Vec<String> = report
        .agents
        .iter()
        .filter(|entity| entity.tag != "Default")
        .map(|entity| format!("{} ({:.1} away)", entity.id, entity.distance))
        .collect();
    if agents.is_empty() {
        out.push_str(" Nobody is nearby.");
    } else {
        out.push_str(&format!(" Nearby agents: {}.", agents.join(", ")));
    }

    let objects: Vec<String> = report
        .objects
        .iter()
        .filter(|entity| entity.tag != "Default")
        .map(|entity| format!("{} ({:.1} away)", entity.id, entity.distance))
        .collect();
    if !objects.is_empty() {
        out.push_str(&format!(" Nearby objects: {}.", objects.join(", ")));
    }

    if let Some(partner_id) = partner {
        out.push_str(&format!(
            " You are in a conversation with {} ({} rounds left).",
            partner_id, rounds
        ));
    }

    out
}
