//! Agent records, the state store, and lifecycle management
//!
//! Agent state is mutated only by the decision dispatcher and by movement
//! completion signals; concurrent decision tasks for different agents each
//! touch only their own record, so per-record locks suffice.

pub mod lifecycle;
pub mod store;

pub use lifecycle::LifecycleManager;
pub use store::AgentStore;

use hamlet_common::{AgentPhase, current_timestamp_secs};
use serde::Serialize;

/// Per-agent record of identity and mutable simulation state.
///
/// `agent_id` is unique and immutable after creation. Invariants:
/// `is_moving` implies a non-empty `desired_location`, and
/// `is_in_conversation` implies `conversation_partner_id` is set with the
/// partner's own record pointing back (symmetric pairing).
#[derive(Debug, Clone, Serialize)]
pub struct AgentRecord {
    pub agent_id: String,
    pub personality: String,
    pub location: String,
    /// Operator-facing feedback string ("Move failed: ...", "Chatting with ...")
    pub status: String,
    pub phase: AgentPhase,
    /// Pending move target, cleared on arrival
    pub desired_location: String,
    pub is_moving: bool,
    pub is_in_conversation: bool,
    pub conversation_partner_id: Option<String>,
    pub conversation_rounds_remaining: u32,
    /// The system prompt is sent only on the agent's first decision request
    #[serde(skip)]
    pub system_prompt_sent: bool,
    pub created_at: i64,
}

impl AgentRecord {
    pub fn new(agent_id: &str, personality: &str, initial_location: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            personality: personality.to_string(),
            location: initial_location.to_string(),
            status: "idle".to_string(),
            phase: AgentPhase::Idle,
            desired_location: String::new(),
            is_moving: false,
            is_in_conversation: false,
            conversation_partner_id: None,
            conversation_rounds_remaining: 0,
            system_prompt_sent: false,
            created_at: current_timestamp_secs(),
        }
    }

    /// Record a move toward `target`. The caller has already rejected
    /// duplicate moves; this only flips the state.
    pub fn begin_move(&mut self, target: &str) {
        self.desired_location = target.to_string();
        self.is_moving = true;
        self.phase = AgentPhase::Moving;
        self.status = format!("heading to {}", target);
    }

    /// Arrival: the pending destination becomes the current location.
    pub fn complete_move(&mut self) {
        if !self.desired_location.is_empty() {
            self.location = std::mem::take(&mut self.desired_location);
        }
        self.is_moving = false;
        if !self.is_in_conversation {
            self.phase = AgentPhase::Idle;
        }
        self.status = format!("arrived at {}", self.location);
    }

    pub fn begin_conversation(&mut self, partner_id: &str, rounds: u32) {
        self.is_in_conversation = true;
        self.conversation_partner_id = Some(partner_id.to_string());
        self.conversation_rounds_remaining = rounds;
        self.phase = AgentPhase::Conversing;
        self.status = format!("talking with {}", partner_id);
    }

    pub fn end_conversation(&mut self) {
        self.is_in_conversation = false;
        self.conversation_partner_id = None;
        self.conversation_rounds_remaining = 0;
        if !self.is_moving {
            self.phase = AgentPhase::Idle;
        }
        self.status = "finished a conversation".to_string();
    }

    /// Local half of the record-level invariants. Symmetry of pairing needs
    /// both records and is checked at the store level in tests.
    pub fn holds_invariants(&self) -> bool {
        if self.is_moving && self.desired_location.is_empty() {
            return false;
        }
        if self.is_in_conversation && self.conversation_partner_id.is_none() {
            return false;
        }
        true
    }
}
