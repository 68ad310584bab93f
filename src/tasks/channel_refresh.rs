//! Status board refresh background task

use std::{sync::Arc, time::Duration};
use tokio::time::interval;
use tracing::{debug, info};

use crate::state::{AppState, BoardUpdate};

/// Periodically republish every channel's status board
pub async fn channel_refresh_task(state: Arc<AppState>, period: Duration) {
    info!("Starting channel refresh task ({}s)", period.as_secs());

    let mut interval = interval(period);

    loop {
        interval.tick().await;

        for channel in state.channels() {
            let mut channel = channel.lock().await;
            match channel.update().await {
                BoardUpdate::Created(handle) => {
                    debug!("Board {} published for '{}'", handle, channel.channel());
                }
                BoardUpdate::PermissionDenied => {
                    debug!("Board for '{}' unavailable", channel.channel());
                }
                BoardUpdate::Empty | BoardUpdate::Edited | BoardUpdate::Failed => {}
            }
        }
    }
}
