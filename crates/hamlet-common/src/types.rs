//! Core value types shared across hamlet components

use serde::{Deserialize, Serialize};

/// A position in the simulated world.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl WorldPosition {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another position.
    pub fn distance_to(&self, other: &WorldPosition) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Coarse lifecycle phase of an agent.
///
/// The agent record also carries a free-text `status` feedback string for
/// operators; the phase is the machine-checkable side of the same state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentPhase {
    Idle,
    Moving,
    Conversing,
    Error,
}

impl Default for AgentPhase {
    fn default() -> Self {
        AgentPhase::Idle
    }
}

impl std::fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AgentPhase::Idle => "idle",
            AgentPhase::Moving => "moving",
            AgentPhase::Conversing => "conversing",
            AgentPhase::Error => "error",
        };
        write!(f, "{}", name)
    }
}
