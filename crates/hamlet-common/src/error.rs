//! Hamlet Common Error Types
//!
//! Centralized error handling for all hamlet components

use std::fmt;

/// Main error type for hamlet operations
#[derive(Debug)]
pub enum HamletError {
    /// Generic error with message
    Generic(String),
    /// IO-related errors
    Io(std::io::Error),
    /// Serialization/deserialization errors
    Serde(serde_json::Error),
    /// Network or timeout failure at the transport level (retried per policy)
    Transport(String),
    /// Well-formed error response from the backend (not retried)
    Application { status: u16, body: String },
    /// Decision text whose final line does not match the action grammar
    InvalidResponseFormat(String),
    /// Agent creation refused because the fleet is at capacity
    CapacityExceeded { limit: usize },
    /// Agent creation refused because the id is already registered
    DuplicateId(String),
    /// Referenced agent does not exist (or no longer exists)
    AgentNotFound(String),
    /// Move target is neither a known location nor a reachable agent
    UnknownLocation(String),
    /// Converse target not found within the proximity radius
    UnknownAgentTarget(String),
    /// A move or converse was requested while one is already active
    AlreadyInProgress(String),
    /// Configuration errors
    Config(String),
}

impl fmt::Display for HamletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HamletError::Generic(msg) => write!(f, "hamlet error: {}", msg),
            HamletError::Io(err) => write!(f, "IO error: {}", err),
            HamletError::Serde(err) => write!(f, "serialization error: {}", err),
            HamletError::Transport(msg) => write!(f, "transport failure: {}", msg),
            HamletError::Application { status, body } => {
                write!(f, "backend returned {}: {}", status, body)
            }
            HamletError::InvalidResponseFormat(line) => {
                write!(f, "decision text does not match action grammar: {:?}", line)
            }
            HamletError::CapacityExceeded { limit } => {
                write!(f, "agent capacity exceeded (max {})", limit)
            }
            HamletError::DuplicateId(id) => write!(f, "agent id {:?} already registered", id),
            HamletError::AgentNotFound(id) => write!(f, "no agent with id {:?}", id),
            HamletError::UnknownLocation(name) => {
                write!(f, "unknown move target {:?}", name)
            }
            HamletError::UnknownAgentTarget(name) => {
                write!(f, "no agent named {:?} nearby", name)
            }
            HamletError::AlreadyInProgress(what) => {
                write!(f, "{} already in progress", what)
            }
            HamletError::Config(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl std::error::Error for HamletError {}

/// Convenience result type for hamlet operations
pub type Result<T> = std::result::Result<T, HamletError>;

// Implement From traits for common error types
impl From<std::io::Error> for HamletError {
    fn from(err: std::io::Error) -> Self {
        HamletError::Io(err)
    }
}

impl From<serde_json::Error> for HamletError {
    fn from(err: serde_json::Error) -> Self {
        HamletError::Serde(err)
    }
}

impl From<anyhow::Error> for HamletError {
    fn from(err: anyhow::Error) -> Self {
        HamletError::Generic(err.to_string())
    }
}

impl HamletError {
    /// Whether the transport layer should retry after this error.
    ///
    /// Only transport-level failures are retried; a well-formed 4xx/5xx
    /// application response is surfaced to the caller immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HamletError::Transport(_))
    }
}
