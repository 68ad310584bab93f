//! Application registry of timers and channel boards

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Instant,
};
use tracing::{info, warn};

use super::{
    Audience, ChannelAggregator, Participant, ParticipantId, SessionData, Stage, Timer,
    TimerOptions, TimerSnapshot,
};
use crate::{
    error::AppError,
    services::{MemoryBoard, MemoryNotifier, MemorySessionStore, SessionStore},
    utils::Clock,
};

type SharedChannel = Arc<tokio::sync::Mutex<ChannelAggregator>>;

/// Registry shared by the HTTP handlers and the background tasks
pub struct AppState {
    timers: Mutex<HashMap<String, Timer>>,
    /// Channel name for each timer
    bindings: Mutex<HashMap<String, String>>,
    channels: Mutex<HashMap<String, SharedChannel>>,
    /// Output collaborators
    pub notifier: Arc<MemoryNotifier>,
    pub board: Arc<MemoryBoard>,
    pub store: Arc<MemorySessionStore>,
    pub clock: Arc<dyn Clock>,
    /// Timer defaults from the command line
    pub default_stages: Vec<Stage>,
    pub options: TimerOptions,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
}

fn lock_failed<T>(what: &'static str) -> impl FnOnce(T) -> AppError {
    move |_| AppError::Internal(format!("Failed to lock {}", what))
}

impl AppState {
    pub fn new(
        port: u16,
        host: String,
        default_stages: Vec<Stage>,
        options: TimerOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            timers: Mutex::new(HashMap::new()),
            bindings: Mutex::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
            notifier: Arc::new(MemoryNotifier::new()),
            board: Arc::new(MemoryBoard::new()),
            store: Arc::new(MemorySessionStore::new()),
            clock,
            default_stages,
            options,
            start_time: Instant::now(),
            port,
            host,
        }
    }

    /// Look up a timer by name
    pub fn timer(&self, name: &str) -> Result<Timer, AppError> {
        self.timers
            .lock()
            .map_err(lock_failed("timer registry"))?
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::UnknownTimer(name.to_string()))
    }

    pub fn timer_names(&self) -> Result<Vec<String>, AppError> {
        let timers = self.timers.lock().map_err(lock_failed("timer registry"))?;
        let mut names: Vec<String> = timers.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Create and set up a timer, binding it to `channel`'s board
    pub async fn create_timer(
        &self,
        name: &str,
        channel: &str,
        audience: Audience,
        stages: Option<Vec<Stage>>,
    ) -> Result<TimerSnapshot, AppError> {
        if self.timer(name).is_ok() {
            return Err(AppError::TimerExists(name.to_string()));
        }

        let timer = Timer::new(
            name,
            audience,
            self.notifier.clone(),
            self.clock.clone(),
            self.options.clone(),
        );
        timer
            .setup(stages.unwrap_or_else(|| self.default_stages.clone()))
            .await?;

        {
            let mut timers = self.timers.lock().map_err(lock_failed("timer registry"))?;
            if timers.contains_key(name) {
                return Err(AppError::TimerExists(name.to_string()));
            }
            timers.insert(name.to_string(), timer.clone());
        }
        self.bindings
            .lock()
            .map_err(lock_failed("channel bindings"))?
            .insert(name.to_string(), channel.to_string());

        let shared = self.channel_or_insert(channel)?;
        shared.lock().await.add_timer(timer.clone());

        info!("Created timer '{}' in channel '{}'", name, channel);
        Ok(timer.snapshot().await)
    }

    /// Stop and drop a timer, parking its subscribers in the session store.
    ///
    /// Returns the number of parked subscriber records.
    pub async fn remove_timer(&self, name: &str) -> Result<usize, AppError> {
        let timer = self
            .timers
            .lock()
            .map_err(lock_failed("timer registry"))?
            .remove(name)
            .ok_or_else(|| AppError::UnknownTimer(name.to_string()))?;
        timer.stop().await;

        let channel = self
            .bindings
            .lock()
            .map_err(lock_failed("channel bindings"))?
            .remove(name);
        if let Some(shared) = channel.and_then(|c| self.channel(&c)) {
            shared.lock().await.remove_timer(name);
        }

        let parked = self.park_subscribers(&timer).await;
        info!("Removed timer '{}', parked {} subscribers", name, parked);
        Ok(parked)
    }

    /// Subscribe a participant, restoring a parked record when one exists
    pub async fn subscribe(
        &self,
        name: &str,
        participant: Participant,
    ) -> Result<bool, AppError> {
        let timer = self.timer(name)?;
        if timer.contains(participant.id).await {
            return Ok(false);
        }

        let parked = self
            .store
            .take_subscriber(participant.id, timer.audience().role_id)
            .map_err(AppError::Internal)?;
        match parked {
            Some(record) => {
                let restored = timer.restore_subscriber(participant, &record).await;
                if !restored {
                    // someone else subscribed first; keep the record parked
                    self.store
                        .save_subscriber(record)
                        .map_err(AppError::Internal)?;
                }
                Ok(restored)
            }
            None => Ok(timer.subscribe(participant).await),
        }
    }

    /// Unsubscribe a participant and hand their session to the store
    pub async fn unsubscribe(
        &self,
        name: &str,
        id: ParticipantId,
    ) -> Result<Option<SessionData>, AppError> {
        let timer = self.timer(name)?;
        let Some(session) = timer.unsubscribe(id).await else {
            return Ok(None);
        };
        self.store
            .save_session(session.clone())
            .map_err(AppError::Internal)?;
        Ok(Some(session))
    }

    fn channel(&self, channel: &str) -> Option<SharedChannel> {
        self.channels.lock().ok()?.get(channel).cloned()
    }

    fn channel_or_insert(&self, channel: &str) -> Result<SharedChannel, AppError> {
        let mut channels = self.channels.lock().map_err(lock_failed("channel registry"))?;
        let shared = channels.entry(channel.to_string()).or_insert_with(|| {
            Arc::new(tokio::sync::Mutex::new(ChannelAggregator::new(
                channel,
                self.board.clone(),
            )))
        });
        Ok(shared.clone())
    }

    /// Every channel board, for the refresh task
    pub fn channels(&self) -> Vec<SharedChannel> {
        self.channels
            .lock()
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Current content of a channel's board, once it has been published
    pub async fn board_content(&self, channel: &str) -> Option<String> {
        let shared = self.channel(channel)?;
        let handle = shared.lock().await.handle()?;
        self.board.content(handle)
    }

    async fn park_subscribers(&self, timer: &Timer) -> usize {
        let mut parked = 0;
        for record in timer.subscriber_records().await {
            match self.store.save_subscriber(record) {
                Ok(()) => parked += 1,
                Err(e) => warn!("Failed to park subscriber: {}", e),
            }
        }
        parked
    }

    /// Stop every timer and park all subscribers
    pub async fn shutdown(&self) {
        let timers: Vec<Timer> = self
            .timers
            .lock()
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default();

        let mut parked = 0;
        for timer in &timers {
            timer.stop().await;
            parked += self.park_subscribers(timer).await;
        }
        info!("Stopped {} timers, parked {} subscribers", timers.len(), parked);
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    use crate::utils::ManualClock;

    fn app() -> (AppState, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let options = TimerOptions {
            tick: std::time::Duration::from_secs(3600),
            ..TimerOptions::default()
        };
        let state = AppState::new(
            0,
            "127.0.0.1".to_string(),
            vec![Stage::new("Work", 25), Stage::new("Break", 5)],
            options,
            clock.clone(),
        );
        (state, clock)
    }

    fn audience() -> Audience {
        Audience {
            group_id: 1,
            role_id: 2,
        }
    }

    fn participant() -> Participant {
        Participant {
            id: 10,
            group_id: 1,
            name: "ada".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_timer_names_are_rejected() {
        let (state, _) = app();
        state.create_timer("focus", "lobby", audience(), None).await.unwrap();
        let result = state.create_timer("focus", "lobby", audience(), None).await;
        assert!(matches!(result, Err(AppError::TimerExists(_))));
        assert_eq!(state.timer_names().unwrap(), vec!["focus".to_string()]);
    }

    #[tokio::test]
    async fn unsubscribe_records_session() {
        let (state, clock) = app();
        state.create_timer("focus", "lobby", audience(), None).await.unwrap();
        assert!(state.subscribe("focus", participant()).await.unwrap());
        assert!(!state.subscribe("focus", participant()).await.unwrap());

        clock.advance(Duration::seconds(300));
        let session = state.unsubscribe("focus", 10).await.unwrap().unwrap();
        assert_eq!(session.clocked_seconds, 300);
        assert_eq!(state.store.sessions(), vec![session]);
        assert!(state.unsubscribe("focus", 10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn removed_timer_parks_and_rejoin_restores() {
        let (state, clock) = app();
        state.create_timer("focus", "lobby", audience(), None).await.unwrap();
        state.subscribe("focus", participant()).await.unwrap();
        clock.advance(Duration::seconds(120));

        assert_eq!(state.remove_timer("focus").await.unwrap(), 1);
        assert!(matches!(state.timer("focus"), Err(AppError::UnknownTimer(_))));

        state.create_timer("focus", "lobby", audience(), None).await.unwrap();
        state.subscribe("focus", participant()).await.unwrap();
        clock.advance(Duration::seconds(30));
        let session = state.unsubscribe("focus", 10).await.unwrap().unwrap();
        assert_eq!(session.clocked_seconds, 150);
        assert!(state.store.parked().is_empty());
    }

    #[tokio::test]
    async fn board_content_appears_after_refresh() {
        let (state, _) = app();
        state.create_timer("focus", "lobby", audience(), None).await.unwrap();
        assert!(state.board_content("lobby").await.is_none());

        for channel in state.channels() {
            channel.lock().await.update().await;
        }
        assert_eq!(
            state.board_content("lobby").await,
            Some("**focus**: *Not set up.*".to_string())
        );
    }
}
