//! Common constants used across hamlet

/// Default maximum number of concurrently registered agents
pub const DEFAULT_MAX_AGENTS: usize = 16;

/// Default number of retries after the initial transport attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default flat delay between transport retries, in seconds
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 2;

/// Default per-attempt request timeout, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default interval between automatic simulation ticks, in seconds
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 10;

/// Default number of rounds a conversation runs before ending
pub const DEFAULT_CONVERSATION_ROUNDS: u32 = 3;

/// Default radius within which other entities are perceived, in world units
pub const DEFAULT_DETECTION_RADIUS: f32 = 10.0;

/// Default field-of-view angle for perception, in degrees
pub const DEFAULT_FIELD_OF_VIEW_DEGREES: f32 = 120.0;

/// Default radius within which a converse target must stand
pub const DEFAULT_CONVERSE_RADIUS: f32 = 15.0;

/// Default duration speech bubbles stay visible, in seconds
pub const DEFAULT_SPEECH_DURATION_SECS: u64 = 5;
