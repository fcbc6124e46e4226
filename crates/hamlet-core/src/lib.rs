//! Hamlet core - the agent-decision orchestration loop
//!
//! This crate implements the per-tick cycle that gathers each agent's local
//! surroundings, asks the decision backend what the agent should do next,
//! and applies the returned action exactly once, while coordinating movement
//! completion, conversation turn-taking, and agent lifecycle.
//!
//! Rendering, pathfinding, and presentation are external collaborators
//! consumed through the narrow seams in [`world`].

pub mod agents;
pub mod decision;
pub mod scheduler;
pub mod transport;
pub mod world;

pub use agents::{AgentRecord, AgentStore, LifecycleManager};
pub use decision::{DecisionAction, DecisionDispatcher, parse_decision};
pub use scheduler::{SchedulerState, TickScheduler};
pub use transport::{BackendClient, DecisionBackend, DecisionRequest, DecisionResponse};
pub use world::{
    ArrivalEvent, LocalWorld, LocationRegistry, MovementSystem, NearbyEntity, NearbyReport,
    Perception, Presentation,
};
