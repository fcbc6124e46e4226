//! Common utility functions used across hamlet components

use chrono::Utc;

/// Get current UTC timestamp as seconds
pub fn current_timestamp_secs() -> i64 {
    Utc::now().timestamp()
}
