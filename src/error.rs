//! Error types for the tracking engine.
//!
//! User-facing input problems (`ParseError`, `ValidationError`) are surfaced to the
//! caller untouched. Lifecycle misuse is reported through `TrackingError`. Plumbing
//! such as the database and settings file uses `anyhow` instead.

use thiserror::Error;

/// Malformed end-time input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("time is empty")]
    Empty,

    #[error("expected H:MM or HH:MM, got '{0}'")]
    MissingColon(String),

    #[error("'{0}' is not a number")]
    NotNumeric(String),

    #[error("hour {0} is out of range")]
    HourOutOfRange(u32),

    #[error("minute {0} is out of range")]
    MinuteOutOfRange(u32),
}

/// Invalid session configuration. Blocks the session from starting.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("add at least one task")]
    NoTasks,

    #[error("task #{position} has an empty name")]
    EmptyTaskName { position: usize },

    #[error("task '{name}' must have more than 0 planned minutes")]
    NonPositiveMinutes { name: String },

    #[error("task '{name}' plans {minutes} minutes, more than can be tracked")]
    MinutesTooLarge { name: String, minutes: i64 },

    #[error("task '{name}' appears more than once")]
    DuplicateTaskName { name: String },

    #[error("end time must be in the future ({total_minutes:.1} minutes planned)")]
    EndTimeNotInFuture { total_minutes: f64 },
}

/// Violations of the task switching contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwitchError {
    #[error("task switching requires a running or paused session")]
    NotTracking,

    #[error("task index {index} is out of range for {task_count} tasks")]
    IndexOutOfRange { index: usize, task_count: usize },
}

/// Lifecycle errors raised by the controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackingError {
    #[error("a session is already being tracked")]
    AlreadyActive,

    #[error("no active session")]
    NoSession,

    #[error("the session has already ended")]
    SessionEnded,

    #[error(transparent)]
    Switch(#[from] SwitchError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_human_readable() {
        assert_eq!(
            ParseError::MinuteOutOfRange(75).to_string(),
            "minute 75 is out of range"
        );
        assert_eq!(
            ValidationError::NonPositiveMinutes { name: "Email".into() }.to_string(),
            "task 'Email' must have more than 0 planned minutes"
        );
        assert_eq!(
            TrackingError::from(SwitchError::NotTracking).to_string(),
            "task switching requires a running or paused session"
        );
    }
}
