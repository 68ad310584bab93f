//! Subscriber presence and active-time accounting

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub type ParticipantId = u64;
pub type GroupId = u64;
pub type RoleId = u64;

/// A live participant as seen by the messaging layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub group_id: GroupId,
    /// Display name used in status boards
    pub name: String,
}

/// Accounting tuple handed to persistence when a session ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub participant_id: ParticipantId,
    pub group_id: GroupId,
    pub role_id: RoleId,
    pub time_joined: DateTime<Utc>,
    pub clocked_seconds: u64,
}

/// Persisted form of a [`Subscriber`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberRecord {
    pub participant_id: ParticipantId,
    pub group_id: GroupId,
    pub role_id: RoleId,
    pub time_joined: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub clocked_seconds: u64,
    pub last_seen: DateTime<Utc>,
    pub warnings: u32,
}

/// One participant's presence record within one timer.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub participant: Participant,
    pub role_id: RoleId,
    pub time_joined: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Seconds accumulated while `active`
    pub clocked_seconds: u64,
    pub active: bool,
    pub last_seen: DateTime<Utc>,
    pub warnings: u32,
}

impl Subscriber {
    /// Create a fresh, active subscriber joining at `now`
    pub fn new(participant: Participant, role_id: RoleId, now: DateTime<Utc>) -> Self {
        Self {
            participant,
            role_id,
            time_joined: now,
            last_updated: now,
            clocked_seconds: 0,
            active: true,
            last_seen: now,
            warnings: 0,
        }
    }

    pub fn id(&self) -> ParticipantId {
        self.participant.id
    }

    /// Credit the time since the last update if active.
    ///
    /// Only whole seconds are credited. The anchor moves by exactly the
    /// credited amount so sub-second remainders carry into the next call.
    /// A clock that moved backwards never removes credited time.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        let elapsed = (now - self.last_updated).num_seconds();
        if !self.active || elapsed < 0 {
            self.last_updated = now;
        } else if elapsed > 0 {
            self.clocked_seconds += elapsed as u64;
            self.last_updated += Duration::seconds(elapsed);
        }
    }

    /// Accumulated seconds as of `now`, without moving the accounting anchor
    pub fn clocked_at(&self, now: DateTime<Utc>) -> u64 {
        let pending = if self.active {
            (now - self.last_updated).num_seconds().max(0) as u64
        } else {
            0
        };
        self.clocked_seconds + pending
    }

    /// Flip the active flag, crediting the time spent in the old state first
    pub fn set_active(&mut self, active: bool, now: DateTime<Utc>) {
        self.touch(now);
        self.active = active;
    }

    /// Record a presence signal
    pub fn bump(&mut self, now: DateTime<Utc>) {
        self.last_seen = now;
        self.warnings = 0;
    }

    pub fn session_data(&mut self, now: DateTime<Utc>) -> SessionData {
        self.touch(now);
        SessionData {
            participant_id: self.participant.id,
            group_id: self.participant.group_id,
            role_id: self.role_id,
            time_joined: self.time_joined,
            clocked_seconds: self.clocked_seconds,
        }
    }

    pub fn serialise(&self) -> SubscriberRecord {
        SubscriberRecord {
            participant_id: self.participant.id,
            group_id: self.participant.group_id,
            role_id: self.role_id,
            time_joined: self.time_joined,
            last_updated: self.last_updated,
            clocked_seconds: self.clocked_seconds,
            last_seen: self.last_seen,
            warnings: self.warnings,
        }
    }

    /// Rebuild a subscriber from a stored record and the live participant
    pub fn deserialise(participant: Participant, role_id: RoleId, record: &SubscriberRecord) -> Self {
        Self {
            participant,
            role_id,
            time_joined: record.time_joined,
            last_updated: record.last_updated,
            clocked_seconds: record.clocked_seconds,
            active: true,
            last_seen: record.last_seen,
            warnings: record.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn participant() -> Participant {
        Participant {
            id: 7,
            group_id: 100,
            name: "ada".to_string(),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn touch_is_idempotent_without_elapsed_time() {
        let mut sub = Subscriber::new(participant(), 1, t0());
        let now = t0() + Duration::seconds(90);
        sub.touch(now);
        sub.touch(now);
        assert_eq!(sub.clocked_seconds, 90);
    }

    #[test]
    fn inactive_time_is_not_credited() {
        let mut sub = Subscriber::new(participant(), 1, t0());
        sub.set_active(false, t0() + Duration::seconds(30));
        sub.touch(t0() + Duration::seconds(600));
        assert_eq!(sub.clocked_seconds, 30);

        sub.set_active(true, t0() + Duration::seconds(700));
        sub.touch(t0() + Duration::seconds(710));
        assert_eq!(sub.clocked_seconds, 40);
    }

    #[test]
    fn sub_second_touches_keep_their_remainder() {
        let mut sub = Subscriber::new(participant(), 1, t0());
        for step in 1..=10 {
            sub.touch(t0() + Duration::milliseconds(900 * step));
        }
        assert_eq!(sub.clocked_seconds, 9);
        assert_eq!(sub.clocked_at(t0() + Duration::milliseconds(9500)), 9);
        assert_eq!(sub.clocked_at(t0() + Duration::milliseconds(10000)), 10);
    }

    #[test]
    fn backwards_clock_credits_nothing() {
        let mut sub = Subscriber::new(participant(), 1, t0());
        sub.touch(t0() - Duration::seconds(5));
        assert_eq!(sub.clocked_seconds, 0);
    }

    #[test]
    fn bump_resets_warnings() {
        let mut sub = Subscriber::new(participant(), 1, t0());
        sub.warnings = 2;
        sub.bump(t0() + Duration::seconds(3));
        assert_eq!(sub.warnings, 0);
        assert_eq!(sub.last_seen, t0() + Duration::seconds(3));
        // presence does not move the accounting anchor
        assert_eq!(sub.last_updated, t0());
    }

    #[test]
    fn session_data_includes_pending_time() {
        let mut sub = Subscriber::new(participant(), 42, t0());
        let data = sub.session_data(t0() + Duration::minutes(25));
        assert_eq!(data.clocked_seconds, 1500);
        assert_eq!(data.role_id, 42);
        assert_eq!(data.group_id, 100);
        assert_eq!(data.time_joined, t0());
    }

    #[test]
    fn record_restores_accounting_fields() {
        let mut sub = Subscriber::new(participant(), 42, t0());
        sub.touch(t0() + Duration::seconds(75));
        sub.warnings = 1;
        sub.last_seen = t0() + Duration::seconds(20);

        let json = serde_json::to_string(&sub.serialise()).unwrap();
        let record: SubscriberRecord = serde_json::from_str(&json).unwrap();
        let restored = Subscriber::deserialise(participant(), 42, &record);

        assert_eq!(restored.time_joined, sub.time_joined);
        assert_eq!(restored.last_updated, sub.last_updated);
        assert_eq!(restored.clocked_seconds, 75);
        assert_eq!(restored.last_seen, sub.last_seen);
        assert_eq!(restored.warnings, 1);
    }
}
