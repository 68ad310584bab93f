//! Shared status board for the timers of one channel

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::Timer;
use crate::{
    error::UiError,
    services::{best_effort, DisplaySurface, MessageHandle},
};

/// Sent in place of the board when the channel refuses to host it
pub const PERMISSION_NOTICE: &str =
    "I need permission to post the status board in this channel! Stopping all timers.";

/// What a single [`ChannelAggregator::update`] call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardUpdate {
    /// No timers are bound, nothing was published
    Empty,
    Created(MessageHandle),
    Edited,
    /// A best-effort create or edit failed and was ignored
    Failed,
    /// The board could not be created; every bound timer was stopped
    PermissionDenied,
}

/// Groups the timers that render into one status board.
pub struct ChannelAggregator {
    channel: String,
    surface: Arc<dyn DisplaySurface>,
    timers: Vec<Timer>,
    handle: Option<MessageHandle>,
    /// Set once the permission notice went out; cleared when a board exists
    notice_sent: bool,
}

impl ChannelAggregator {
    pub fn new(channel: impl Into<String>, surface: Arc<dyn DisplaySurface>) -> Self {
        Self {
            channel: channel.into(),
            surface,
            timers: Vec::new(),
            handle: None,
            notice_sent: false,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Handle of the board once it has been created
    pub fn handle(&self) -> Option<MessageHandle> {
        self.handle
    }

    pub fn timers(&self) -> &[Timer] {
        &self.timers
    }

    /// Bind a timer; boards render timers in the order they were added
    pub fn add_timer(&mut self, timer: Timer) {
        self.timers.push(timer);
    }

    pub fn remove_timer(&mut self, name: &str) -> Option<Timer> {
        let index = self.timers.iter().position(|t| t.name() == name)?;
        Some(self.timers.remove(index))
    }

    /// Render every bound timer and publish the combined board.
    pub async fn update(&mut self) -> BoardUpdate {
        if self.timers.is_empty() {
            return BoardUpdate::Empty;
        }

        let mut statuses = Vec::with_capacity(self.timers.len());
        for timer in &self.timers {
            statuses.push(timer.pretty_pinstatus().await);
        }
        let content = statuses.join("\n\n");

        if let Some(handle) = self.handle {
            return match best_effort("status board edit", self.surface.edit(handle, &content)).await {
                Some(()) => BoardUpdate::Edited,
                None => BoardUpdate::Failed,
            };
        }

        match self.surface.create(&content).await {
            Ok(handle) => {
                info!("Created status board {} in channel '{}'", handle, self.channel);
                self.handle = Some(handle);
                self.notice_sent = false;
                best_effort("status board pin", self.surface.pin(handle)).await;
                BoardUpdate::Created(handle)
            }
            Err(UiError::PermissionDenied) => {
                warn!(
                    "No permission for a status board in channel '{}', stopping {} timers",
                    self.channel,
                    self.timers.len()
                );
                if !self.notice_sent {
                    best_effort("permission notice", self.surface.send_notice(PERMISSION_NOTICE))
                        .await;
                    self.notice_sent = true;
                }
                for timer in &self.timers {
                    timer.stop().await;
                }
                BoardUpdate::PermissionDenied
            }
            Err(e) => {
                debug!("Ignoring failed status board creation: {}", e);
                BoardUpdate::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::{
        services::{MemoryBoard, MemoryNotifier},
        state::{Audience, Stage, TimerOptions, TimerState},
        utils::ManualClock,
    };

    fn timer(name: &str) -> Timer {
        Timer::new(
            name,
            Audience {
                group_id: 1,
                role_id: 2,
            },
            Arc::new(MemoryNotifier::new()),
            Arc::new(ManualClock::new(Utc::now())),
            TimerOptions {
                tick: std::time::Duration::from_secs(3600),
                ..TimerOptions::default()
            },
        )
    }

    #[tokio::test]
    async fn empty_channel_publishes_nothing() {
        let board = Arc::new(MemoryBoard::new());
        let mut channel = ChannelAggregator::new("lobby", board.clone());
        assert_eq!(channel.update().await, BoardUpdate::Empty);
        assert_eq!(board.surface_count(), 0);
    }

    #[tokio::test]
    async fn first_update_creates_and_pins_then_edits() {
        let board = Arc::new(MemoryBoard::new());
        let mut channel = ChannelAggregator::new("lobby", board.clone());
        channel.add_timer(timer("A"));

        let handle = match channel.update().await {
            BoardUpdate::Created(handle) => handle,
            other => panic!("unexpected update: {:?}", other),
        };
        assert_eq!(board.pinned(), vec![handle]);

        assert_eq!(channel.update().await, BoardUpdate::Edited);
        assert_eq!(board.surface_count(), 1);
        assert_eq!(board.pinned().len(), 1);
    }

    #[tokio::test]
    async fn failed_edit_is_swallowed() {
        let board = Arc::new(MemoryBoard::new());
        let mut channel = ChannelAggregator::new("lobby", board.clone());
        channel.add_timer(timer("A"));
        channel.update().await;

        board.fail_edits(true);
        assert_eq!(channel.update().await, BoardUpdate::Failed);
        assert!(channel.handle().is_some());
    }

    #[tokio::test]
    async fn permission_denied_stops_bound_timers() {
        let board = Arc::new(MemoryBoard::new());
        board.deny_create(true);
        let mut channel = ChannelAggregator::new("lobby", board.clone());
        let first = timer("A");
        first.setup(vec![Stage::new("Work", 25)]).await.unwrap();
        first.start().await.unwrap();
        channel.add_timer(first.clone());

        assert_eq!(channel.update().await, BoardUpdate::PermissionDenied);
        assert_eq!(first.state().await, TimerState::Stopped);
        assert_eq!(board.notices(), vec![PERMISSION_NOTICE.to_string()]);
        assert!(channel.handle().is_none());
    }

    #[tokio::test]
    async fn permission_notice_is_sent_once_until_board_exists() {
        let board = Arc::new(MemoryBoard::new());
        board.deny_create(true);
        let mut channel = ChannelAggregator::new("lobby", board.clone());
        channel.add_timer(timer("A"));

        for _ in 0..3 {
            assert_eq!(channel.update().await, BoardUpdate::PermissionDenied);
        }
        assert_eq!(board.notices().len(), 1);

        board.deny_create(false);
        assert!(matches!(channel.update().await, BoardUpdate::Created(_)));
        assert_eq!(board.notices().len(), 1);
    }

    #[test]
    fn remove_timer_preserves_order() {
        let board = Arc::new(MemoryBoard::new());
        let mut channel = ChannelAggregator::new("lobby", board);
        channel.add_timer(timer("A"));
        channel.add_timer(timer("B"));
        channel.add_timer(timer("C"));

        assert!(channel.remove_timer("B").is_some());
        assert!(channel.remove_timer("missing").is_none());
        let names: Vec<&str> = channel.timers().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["A", "C"]);
    }
}
