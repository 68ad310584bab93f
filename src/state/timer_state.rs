//! Timer run state

use std::fmt;

use serde::{Deserialize, Serialize};

/// Running state of a timer.
///
/// `Stopped` covers both "never started" and "halted externally"; it is
/// re-entered through `setup`/`start`, so there is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl TimerState {
    /// Check if the timer loop should be advancing
    pub fn is_running(&self) -> bool {
        matches!(self, TimerState::Running)
    }

    /// Running and Paused timers both have a live stage to render
    pub fn is_live(&self) -> bool {
        matches!(self, TimerState::Running | TimerState::Paused)
    }
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerState::Stopped => "stopped",
            TimerState::Running => "running",
            TimerState::Paused => "paused",
        };
        f.write_str(name)
    }
}
