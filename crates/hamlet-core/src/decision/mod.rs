//! Decision requests and their application
//!
//! One decision per agent per tick: build a feedback snapshot of what the
//! agent knows, ask the backend, apply the answer exactly once.

pub mod dispatcher;
pub mod grammar;

pub use dispatcher::{AgentEnvironment, DecisionDispatcher};
pub use grammar::{DecisionAction, parse_decision, reasoning_lines};
