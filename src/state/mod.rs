//! State management module
//!
//! Stages, subscribers, timers and the channel boards that aggregate them,
//! plus the application registry used by the HTTP surface.

pub mod app_state;
pub mod channel;
pub mod stage;
pub mod subscriber;
pub mod timer;
pub mod timer_state;

// Re-export main types
pub use app_state::AppState;
pub use channel::{BoardUpdate, ChannelAggregator};
pub use stage::{parse_stage_list, Stage};
pub use subscriber::{
    GroupId, Participant, ParticipantId, RoleId, SessionData, Subscriber, SubscriberRecord,
};
pub use timer::{format_remaining, Audience, Timer, TimerOptions, TimerSnapshot};
pub use timer_state::TimerState;
