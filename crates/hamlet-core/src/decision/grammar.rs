//! The decision action grammar
//!
//! The backend's decision text is free-form reasoning except for its last
//! non-empty line, which must match `MOVE:|NOTHING:|CONVERSE: <param>`,
//! case-insensitively. Lines above the action line are logged, never parsed.

use hamlet_common::{HamletError, Result};

/// The one action a decision resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionAction {
    /// Head for a known location or toward another agent
    Move(String),
    /// Stay put
    Nothing,
    /// Start (or continue) a conversation with the named agent
    Converse(String),
}

/// Parse a decision text into its action.
///
/// Returns `InvalidResponseFormat` when the last non-empty line does not
/// match the grammar; this is an error value, never a panic.
pub fn parse_decision(text: &str) -> Result<DecisionAction> {
    let line = text
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| HamletError::InvalidResponseFormat(String::new()))?;

    let Some((verb, param)) = line.split_once(':') else {
        return Err(HamletError::InvalidResponseFormat(line.to_string()));
    };

    let param = param.trim().to_string();
    match verb.trim().to_ascii_uppercase().as_str() {
        "MOVE" => Ok(DecisionAction::Move(param)),
        "NOTHING" => Ok(DecisionAction::Nothing),
        "CONVERSE" => Ok(DecisionAction::Converse(param)),
        _ => Err(HamletError::InvalidResponseFormat(line.to_string())),
    }
}

/// The reasoning portion of a decision text: every line above the action
/// line, trimmed of trailing blanks.
pub fn reasoning_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.lines().map(str::trim).collect();
    while matches!(lines.last(), Some(last) if last.is_empty()) {
        lines.pop();
    }
    lines.pop(); // the action line
    lines.into_iter().filter(|line| !line.is_empty()).collect()
}
