//! Configuration types for hamlet components

use crate::constants::*;
use serde::{Deserialize, Serialize};

/// Configuration for the backend transport client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the decision backend, e.g. "http://127.0.0.1:8000"
    pub base_url: String,
    /// Retries after the initial attempt before surfacing failure
    pub max_retries: u32,
    /// Flat delay between retries, in seconds (deliberately non-exponential)
    pub retry_delay_secs: u64,
    /// Per-attempt request timeout, in seconds
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Configuration for the simulation loop and decision dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Maximum number of concurrently registered agents
    pub max_agents: usize,
    /// Interval between automatic ticks, in seconds
    pub tick_interval_secs: u64,
    /// Whether the scheduler drives ticks on a timer (vs. manual triggers)
    pub auto_tick: bool,
    /// Pause the scheduler on a tick-level error instead of continuing
    pub pause_on_error: bool,
    /// Rounds a conversation runs before both partners disengage
    pub conversation_rounds: u32,
    /// Radius within which other entities are perceived
    pub detection_radius: f32,
    /// Field-of-view angle for perception, in degrees
    pub field_of_view_degrees: f32,
    /// Whether perception requires unobstructed line of sight
    pub line_of_sight: bool,
    /// Radius within which a converse target must stand
    pub converse_radius: f32,
    /// Push an aggregated environment snapshot to the backend after each tick
    pub push_environment: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_agents: DEFAULT_MAX_AGENTS,
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            auto_tick: false,
            pause_on_error: false,
            conversation_rounds: DEFAULT_CONVERSATION_ROUNDS,
            detection_radius: DEFAULT_DETECTION_RADIUS,
            field_of_view_degrees: DEFAULT_FIELD_OF_VIEW_DEGREES,
            line_of_sight: false,
            converse_radius: DEFAULT_CONVERSE_RADIUS,
            push_environment: false,
        }
    }
}

/// Configuration for the local control-surface server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}
