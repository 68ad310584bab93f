//! Stage Timer - a staged interval timer engine
//!
//! Named timers cycle through ordered stages (work/break style intervals),
//! advance on their own as time runs out, account the active time of their
//! subscribers and render into shared, periodically refreshed status boards.

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use error::{AppError, TimerError, UiError};
pub use state::{AppState, ChannelAggregator, Stage, Timer, TimerOptions, TimerState};
pub use utils::signals::shutdown_signal;
