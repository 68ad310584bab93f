//! Staged timer state machine
//!
//! A [`Timer`] is a cheap, cloneable handle. All mutable state sits behind a
//! single async mutex per timer, which is shared by the timer's own loop (see
//! [`crate::tasks::runloop`]) and by any number of external callers. A stage
//! transition runs entirely inside that lock, including the notification it
//! sends, so readers see either the old stage or the new one, never a mix.

use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::{
    subscriber::{GroupId, Participant, ParticipantId, RoleId, SessionData, Subscriber, SubscriberRecord},
    Stage, TimerState,
};
use crate::{
    error::TimerError,
    services::{best_effort, Notifier},
    tasks::runloop::timer_loop,
    utils::Clock,
};

/// Loop cadence and clock-title settings for a timer
#[derive(Debug, Clone)]
pub struct TimerOptions {
    /// Delay between loop ticks
    pub tick: Duration,
    /// Minimum time between two clock-title refreshes
    pub clock_period: Duration,
    /// Whether the clock title is maintained at all
    pub clock_title: bool,
}

impl Default for TimerOptions {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            clock_period: Duration::from_secs(5),
            clock_title: true,
        }
    }
}

/// The group and role a timer's notifications are addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audience {
    pub group_id: GroupId,
    pub role_id: RoleId,
}

impl Audience {
    pub fn mention(&self) -> String {
        format!("<@&{}>", self.role_id)
    }
}

/// Point-in-time view of one subscriber
#[derive(Debug, Clone, Serialize)]
pub struct SubscriberSnapshot {
    pub id: ParticipantId,
    pub name: String,
    pub active: bool,
    pub clocked_seconds: u64,
    pub warnings: u32,
}

/// Point-in-time view of a timer
#[derive(Debug, Clone, Serialize)]
pub struct TimerSnapshot {
    pub name: String,
    pub state: TimerState,
    pub stage_index: usize,
    pub stage: Option<String>,
    pub focus: bool,
    pub remaining_seconds: i64,
    pub remaining: String,
    pub subscribers: Vec<SubscriberSnapshot>,
}

#[derive(Debug, Default)]
struct TimerInner {
    stages: Vec<Stage>,
    current_stage: usize,
    state: TimerState,
    session_start: Option<DateTime<Utc>>,
    current_stage_start: Option<DateTime<Utc>>,
    /// Only authoritative while not running
    remaining: Option<i64>,
    subscribers: BTreeMap<ParticipantId, Subscriber>,
    last_clock_update: Option<DateTime<Utc>>,
    /// Bumped every time a loop is spawned; older loops exit on mismatch
    loop_epoch: u64,
}

impl TimerInner {
    fn current(&self) -> Option<&Stage> {
        self.stages.get(self.current_stage)
    }

    /// Seconds left in the current stage as of `now`
    fn live_remaining(&self, now: DateTime<Utc>) -> i64 {
        match (self.state, self.current(), self.current_stage_start) {
            (TimerState::Running, Some(stage), Some(started)) => {
                stage.duration_secs() - (now - started).num_seconds()
            }
            _ => self.remaining.unwrap_or(0),
        }
    }

    fn arm_loop(&mut self) -> u64 {
        self.loop_epoch += 1;
        self.loop_epoch
    }
}

struct TimerShared {
    name: String,
    audience: Audience,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    options: TimerOptions,
    inner: Mutex<TimerInner>,
}

/// A named timer cycling through its stages.
#[derive(Clone)]
pub struct Timer {
    shared: Arc<TimerShared>,
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("name", &self.shared.name)
            .field("audience", &self.shared.audience)
            .finish_non_exhaustive()
    }
}

impl Timer {
    /// Create an unconfigured, stopped timer
    pub fn new(
        name: impl Into<String>,
        audience: Audience,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        options: TimerOptions,
    ) -> Self {
        Self {
            shared: Arc::new(TimerShared {
                name: name.into(),
                audience,
                notifier,
                clock,
                options,
                inner: Mutex::new(TimerInner::default()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn audience(&self) -> Audience {
        self.shared.audience
    }

    pub fn options(&self) -> &TimerOptions {
        &self.shared.options
    }

    fn now(&self) -> DateTime<Utc> {
        self.shared.clock.now()
    }

    async fn lock(&self) -> MutexGuard<'_, TimerInner> {
        self.shared.inner.lock().await
    }

    /// Configure the stage cycle and reset all timing anchors.
    ///
    /// Leaves the timer stopped; a loop that was running exits on its next tick.
    pub async fn setup(&self, stages: Vec<Stage>) -> Result<(), TimerError> {
        let first = stages.first().ok_or(TimerError::EmptyStages)?;
        if let Some(stage) = stages.iter().find(|s| s.duration_minutes == 0) {
            return Err(TimerError::InvalidStage {
                name: stage.name.clone(),
            });
        }

        let now = self.now();
        let remaining = first.duration_secs();
        let mut inner = self.lock().await;
        inner.state = TimerState::Stopped;
        inner.stages = stages;
        inner.current_stage = 0;
        inner.session_start = Some(now);
        inner.current_stage_start = Some(now);
        inner.remaining = Some(remaining);

        info!(
            "Timer '{}' set up with {} stages",
            self.shared.name,
            inner.stages.len()
        );
        Ok(())
    }

    /// Start, or restart, the cycle from the first stage.
    ///
    /// Only spawns a loop when the timer was not already running.
    pub async fn start(&self) -> Result<(), TimerError> {
        let mut inner = self.lock().await;
        if inner.stages.is_empty() {
            return Err(TimerError::NotConfigured(self.shared.name.clone()));
        }

        let was_running = inner.state.is_running();
        self.change_stage_locked(&mut inner, 0, true, false).await;
        inner.state = TimerState::Running;
        info!("Timer '{}' started", self.shared.name);

        if !was_running {
            let epoch = inner.arm_loop();
            drop(inner);
            self.spawn_loop(epoch);
        }
        Ok(())
    }

    /// Freeze the remaining time of the current stage
    pub async fn pause(&self) -> Result<(), TimerError> {
        let now = self.now();
        let mut inner = self.lock().await;
        if !inner.state.is_running() {
            return Err(TimerError::InvalidState {
                action: "pause",
                state: inner.state,
            });
        }

        let remaining = inner.live_remaining(now);
        inner.remaining = Some(remaining);
        inner.state = TimerState::Paused;
        info!(
            "Timer '{}' paused with {}s remaining",
            self.shared.name, remaining
        );
        Ok(())
    }

    /// Continue a paused timer from where it was frozen
    pub async fn resume(&self) -> Result<(), TimerError> {
        let now = self.now();
        let mut inner = self.lock().await;
        if inner.state != TimerState::Paused {
            return Err(TimerError::InvalidState {
                action: "resume",
                state: inner.state,
            });
        }

        let duration = inner.current().map(Stage::duration_secs).unwrap_or(0);
        let remaining = inner.remaining.unwrap_or(duration);
        inner.current_stage_start = Some(now - chrono::Duration::seconds(duration - remaining));
        inner.state = TimerState::Running;
        info!("Timer '{}' resumed", self.shared.name);

        let epoch = inner.arm_loop();
        drop(inner);
        self.spawn_loop(epoch);
        Ok(())
    }

    /// Halt the timer; its loop exits on the next tick
    pub async fn stop(&self) {
        let now = self.now();
        let mut inner = self.lock().await;
        if inner.state == TimerState::Stopped {
            return;
        }
        let remaining = inner.live_remaining(now);
        inner.remaining = Some(remaining);
        inner.state = TimerState::Stopped;
        info!("Timer '{}' stopped", self.shared.name);
    }

    /// Jump to `target` (taken modulo the number of stages).
    pub async fn change_stage(
        &self,
        target: i64,
        notify: bool,
        report_old: bool,
    ) -> Result<(), TimerError> {
        let mut inner = self.lock().await;
        if inner.stages.is_empty() {
            return Err(TimerError::NotConfigured(self.shared.name.clone()));
        }
        self.change_stage_locked(&mut inner, target, notify, report_old)
            .await;
        Ok(())
    }

    /// Force-advance to the next stage
    pub async fn skip(&self) -> Result<(), TimerError> {
        let mut inner = self.lock().await;
        if inner.stages.is_empty() {
            return Err(TimerError::NotConfigured(self.shared.name.clone()));
        }
        let next = inner.current_stage as i64 + 1;
        self.change_stage_locked(&mut inner, next, true, true).await;
        Ok(())
    }

    async fn change_stage_locked(
        &self,
        inner: &mut TimerInner,
        target: i64,
        notify: bool,
        report_old: bool,
    ) {
        let now = self.now();
        for subscriber in inner.subscribers.values_mut() {
            subscriber.touch(now);
        }

        let index = target.rem_euclid(inner.stages.len() as i64) as usize;

        if notify {
            let text = {
                let old = &inner.stages[inner.current_stage];
                let new = &inner.stages[index];
                let old_str = if report_old {
                    format!("**{}** finished! ", old.name)
                } else {
                    String::new()
                };
                format!(
                    "{}\n{}Starting **{}** ({} minutes). {}\n\
                     Please react to this message to register your presence!",
                    self.shared.audience.mention(),
                    old_str,
                    new.name,
                    new.duration_minutes,
                    new.message
                )
            };

            let notifier = &self.shared.notifier;
            if let Some(handle) = best_effort("stage notification", notifier.send(&text)).await {
                best_effort("acknowledgement", notifier.add_acknowledgement(handle)).await;
            }
        }

        let stage = &inner.stages[index];
        let remaining = stage.duration_secs();
        info!(
            "Timer '{}' entering stage {} ({}, {} min)",
            self.shared.name, index, stage.name, stage.duration_minutes
        );
        inner.current_stage = index;
        inner.current_stage_start = Some(self.now());
        inner.remaining = Some(remaining);
    }

    fn spawn_loop(&self, epoch: u64) {
        tokio::spawn(timer_loop(self.clone(), epoch));
    }

    /// One loop iteration: refresh the remaining time and advance if due.
    ///
    /// Returns `false` once the loop identified by `epoch` should exit.
    pub(crate) async fn tick(&self, epoch: u64) -> bool {
        let mut inner = self.lock().await;
        if !inner.state.is_running() || inner.loop_epoch != epoch {
            return false;
        }

        let remaining = inner.live_remaining(self.now());
        inner.remaining = Some(remaining);
        if remaining <= 0 {
            let next = inner.current_stage as i64 + 1;
            self.change_stage_locked(&mut inner, next, true, true).await;
        }
        true
    }

    /// Rename the clock display to the current stage and remaining time.
    ///
    /// Skipped entirely when the last attempt was less than one clock period ago.
    pub async fn update_clock_channel(&self) {
        if !self.shared.options.clock_title {
            return;
        }

        let title = {
            let now = self.now();
            let mut inner = self.lock().await;
            let period = self.shared.options.clock_period.as_secs() as i64;
            if let Some(last) = inner.last_clock_update {
                if (now - last).num_seconds() < period {
                    return;
                }
            }
            let Some(stage) = inner.current() else {
                return;
            };
            let title = format!(
                "{} - {}",
                stage.name,
                format_remaining(inner.live_remaining(now))
            );
            inner.last_clock_update = Some(now);
            title
        };

        debug!("Timer '{}' clock title: {}", self.shared.name, title);
        best_effort(
            "clock title edit",
            self.shared.notifier.edit_display_title(&title),
        )
        .await;
    }

    /// Add a participant; returns `false` if they were already subscribed
    pub async fn subscribe(&self, participant: Participant) -> bool {
        let now = self.now();
        let mut inner = self.lock().await;
        if inner.subscribers.contains_key(&participant.id) {
            return false;
        }
        info!(
            "Participant {} subscribed to timer '{}'",
            participant.id, self.shared.name
        );
        let subscriber = Subscriber::new(participant, self.shared.audience.role_id, now);
        inner.subscribers.insert(subscriber.id(), subscriber);
        true
    }

    /// Remove a participant and return their final accounting
    pub async fn unsubscribe(&self, id: ParticipantId) -> Option<SessionData> {
        let now = self.now();
        let mut inner = self.lock().await;
        let mut subscriber = inner.subscribers.remove(&id)?;
        let session = subscriber.session_data(now);
        info!(
            "Participant {} left timer '{}' after {}s active",
            id, self.shared.name, session.clocked_seconds
        );
        Some(session)
    }

    pub async fn contains(&self, id: ParticipantId) -> bool {
        self.lock().await.subscribers.contains_key(&id)
    }

    /// Record a presence signal for a subscriber
    pub async fn bump(&self, id: ParticipantId) -> bool {
        let now = self.now();
        let mut inner = self.lock().await;
        match inner.subscribers.get_mut(&id) {
            Some(subscriber) => {
                subscriber.bump(now);
                true
            }
            None => false,
        }
    }

    pub async fn set_active(&self, id: ParticipantId, active: bool) -> bool {
        let now = self.now();
        let mut inner = self.lock().await;
        match inner.subscribers.get_mut(&id) {
            Some(subscriber) => {
                subscriber.set_active(active, now);
                true
            }
            None => false,
        }
    }

    /// Rebuild a subscriber from a persisted record.
    ///
    /// Returns false, leaving the live entry alone, if the participant is
    /// already subscribed.
    pub async fn restore_subscriber(&self, participant: Participant, record: &SubscriberRecord) -> bool {
        let id = participant.id;
        let mut inner = self.lock().await;
        if inner.subscribers.contains_key(&id) {
            return false;
        }
        let subscriber =
            Subscriber::deserialise(participant, self.shared.audience.role_id, record);
        inner.subscribers.insert(id, subscriber);
        debug!("Restored participant {} on timer '{}'", id, self.shared.name);
        true
    }

    /// Bring every subscriber's accounting up to date and serialise it
    pub async fn subscriber_records(&self) -> Vec<SubscriberRecord> {
        let now = self.now();
        let mut inner = self.lock().await;
        inner
            .subscribers
            .values_mut()
            .map(|subscriber| {
                subscriber.touch(now);
                subscriber.serialise()
            })
            .collect()
    }

    pub async fn state(&self) -> TimerState {
        self.lock().await.state
    }

    pub async fn stage_index(&self) -> usize {
        self.lock().await.current_stage
    }

    pub async fn current_stage(&self) -> Option<Stage> {
        self.lock().await.current().cloned()
    }

    pub async fn session_start(&self) -> Option<DateTime<Utc>> {
        self.lock().await.session_start
    }

    pub async fn remaining_seconds(&self) -> i64 {
        let now = self.now();
        self.lock().await.live_remaining(now)
    }

    pub async fn pretty_remaining(&self) -> String {
        format_remaining(self.remaining_seconds().await)
    }

    /// Render the status block shown on the shared board
    pub async fn pretty_pinstatus(&self) -> String {
        let now = self.now();
        let inner = self.lock().await;
        render_status(&self.shared.name, &inner, now)
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        let now = self.now();
        let inner = self.lock().await;
        let remaining = inner.live_remaining(now);
        TimerSnapshot {
            name: self.shared.name.clone(),
            state: inner.state,
            stage_index: inner.current_stage,
            stage: inner.current().map(|s| s.name.clone()),
            focus: inner.current().map(|s| s.focus).unwrap_or(false),
            remaining_seconds: remaining,
            remaining: format_remaining(remaining),
            subscribers: inner
                .subscribers
                .values()
                .map(|s| SubscriberSnapshot {
                    id: s.id(),
                    name: s.participant.name.clone(),
                    active: s.active,
                    clocked_seconds: s.clocked_at(now),
                    warnings: s.warnings,
                })
                .collect(),
        }
    }
}

/// Format seconds as `HH:MM:SS`, clamping negatives to zero
pub fn format_remaining(seconds: i64) -> String {
    let diff = seconds.max(0);
    let hours = diff / 3600;
    let minutes = (diff % 3600) / 60;
    let seconds = diff % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

fn render_status(name: &str, inner: &TimerInner, now: DateTime<Utc>) -> String {
    let current = match inner.current() {
        Some(stage) if inner.state.is_live() => stage,
        _ => return format!("**{}**: *Not set up.*", name),
    };

    let remaining = format_remaining(inner.live_remaining(now));
    let width = inner
        .stages
        .iter()
        .map(|s| s.name.chars().count())
        .max()
        .unwrap_or(0);

    let stage_lines: Vec<String> = inner
        .stages
        .iter()
        .enumerate()
        .map(|(i, stage)| {
            let is_current = i == inner.current_stage;
            // zero-width space keeps the leading padding from being trimmed
            let prefix = if is_current { "->" } else { "\u{200b}  " };
            let live = if is_current {
                format!("(**{}**)", remaining)
            } else {
                String::new()
            };
            format!(
                "`{}{:>width$}:` {} min  {}",
                prefix,
                stage.name,
                stage.duration_minutes,
                live,
                width = width
            )
        })
        .collect();

    let names: Vec<&str> = inner
        .subscribers
        .values()
        .map(|s| s.participant.name.as_str())
        .collect();
    let subscribers = if names.is_empty() {
        "*No subscribers*".to_string()
    } else {
        format!("```{}```", names.join(", "))
    };

    let paused = if inner.state == TimerState::Paused {
        " ***Paused***"
    } else {
        ""
    };

    format!(
        "**{}** ({}){}\n{}\n{}",
        name,
        current.name,
        paused,
        stage_lines.join("\n"),
        subscribers
    )
}
