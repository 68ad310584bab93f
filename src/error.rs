//! Error types shared across the engine

use thiserror::Error;

use crate::state::TimerState;

/// Errors raised by timer operations.
///
/// All of these are rejected before any state is mutated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// `setup`/`start` called without any stages
    #[error("timer requires at least one stage")]
    EmptyStages,

    /// A stage with a zero-minute duration would advance on every tick
    #[error("stage '{name}' must last at least one minute")]
    InvalidStage { name: String },

    /// The timer has never been given a stage list
    #[error("timer '{0}' is not set up")]
    NotConfigured(String),

    /// The operation does not apply in the current state
    #[error("cannot {action} a timer that is {state}")]
    InvalidState {
        action: &'static str,
        state: TimerState,
    },
}

/// Failures reported by the output collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UiError {
    /// The destination refused the operation for lack of privileges
    #[error("permission denied")]
    PermissionDenied,

    /// Any other send/edit/pin failure
    #[error("output failed: {0}")]
    Failed(String),
}

/// Errors parsing command-line configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid stage '{0}', expected NAME:MINUTES")]
    MalformedStage(String),

    #[error("invalid duration for stage '{name}': {value}")]
    InvalidDuration { name: String, value: String },
}

/// Errors surfaced by the application registry to the HTTP layer
#[derive(Error, Debug)]
pub enum AppError {
    #[error("no timer named '{0}'")]
    UnknownTimer(String),

    #[error("a timer named '{0}' already exists")]
    TimerExists(String),

    #[error(transparent)]
    Timer(#[from] TimerError),

    #[error("{0}")]
    Internal(String),
}
