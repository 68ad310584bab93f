//! External collaborator module
//!
//! Contracts for everything the engine delegates (notifications, the
//! status board, session persistence) plus in-memory implementations.

pub mod memory;
pub mod output;
pub mod store;

// Re-export main types
pub use memory::{MemoryBoard, MemoryNotifier};
pub use output::{best_effort, DisplaySurface, MessageHandle, Notifier, UiFut};
pub use store::{MemorySessionStore, SessionStore};
