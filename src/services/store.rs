//! Session persistence contract

use std::sync::Mutex;

use crate::state::{ParticipantId, RoleId, SessionData, SubscriberRecord};

/// Receives finished sessions and parked subscriber records.
///
/// Persistence lives outside the engine; it only hands records over and
/// reads them back when rebuilding subscribers.
pub trait SessionStore: Send + Sync {
    fn save_session(&self, session: SessionData) -> Result<(), String>;

    fn save_subscriber(&self, record: SubscriberRecord) -> Result<(), String>;

    /// Remove and return the parked record for a participant, if any
    fn take_subscriber(
        &self,
        participant_id: ParticipantId,
        role_id: RoleId,
    ) -> Result<Option<SubscriberRecord>, String>;
}

/// Store that keeps everything for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<Vec<SessionData>>,
    subscribers: Mutex<Vec<SubscriberRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions(&self) -> Vec<SessionData> {
        self.sessions.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn parked(&self) -> Vec<SubscriberRecord> {
        self.subscribers.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl SessionStore for MemorySessionStore {
    fn save_session(&self, session: SessionData) -> Result<(), String> {
        self.sessions
            .lock()
            .map_err(|e| format!("Failed to lock session store: {}", e))?
            .push(session);
        Ok(())
    }

    fn save_subscriber(&self, record: SubscriberRecord) -> Result<(), String> {
        let mut subscribers = self
            .subscribers
            .lock()
            .map_err(|e| format!("Failed to lock subscriber store: {}", e))?;
        subscribers.retain(|r| {
            !(r.participant_id == record.participant_id && r.role_id == record.role_id)
        });
        subscribers.push(record);
        Ok(())
    }

    fn take_subscriber(
        &self,
        participant_id: ParticipantId,
        role_id: RoleId,
    ) -> Result<Option<SubscriberRecord>, String> {
        let mut subscribers = self
            .subscribers
            .lock()
            .map_err(|e| format!("Failed to lock subscriber store: {}", e))?;
        let position = subscribers
            .iter()
            .position(|r| r.participant_id == participant_id && r.role_id == role_id);
        Ok(position.map(|i| subscribers.remove(i)))
    }
}
