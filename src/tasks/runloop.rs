//! Per-timer scheduling loop

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::state::Timer;

/// Autonomous loop driving one timer while it is running.
///
/// Each tick refreshes the remaining time, advances the stage when it has
/// run out and refreshes the clock title. The loop exits on the first tick
/// that finds the timer no longer running, or finds that a newer loop
/// (`epoch`) has replaced it.
pub async fn timer_loop(timer: Timer, epoch: u64) {
    info!("Starting loop {} for timer '{}'", epoch, timer.name());

    let period = timer.options().tick;
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        if !timer.tick(epoch).await {
            break;
        }
        timer.update_clock_channel().await;
    }

    debug!("Loop {} for timer '{}' exited", epoch, timer.name());
}
