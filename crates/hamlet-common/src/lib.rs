//! Hamlet Common - Shared utilities and types
//!
//! This crate provides common error types, configuration structs,
//! and value types used across all hamlet components.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::{BackendConfig, ServerConfig, SimulationConfig};
pub use constants::*;
pub use error::{HamletError, Result};
pub use types::{AgentPhase, WorldPosition};
pub use utils::*;
