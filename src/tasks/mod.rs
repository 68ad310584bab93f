//! Background tasks module
//!
//! The per-timer scheduling loop and the board refresh task that runs
//! alongside the HTTP server.

pub mod channel_refresh;
pub mod runloop;

// Re-export main functions
pub use channel_refresh::channel_refresh_task;
pub use runloop::timer_loop;
