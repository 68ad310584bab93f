//! API request and response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{Audience, Stage, TimerSnapshot};

/// Body of `POST /timers/:name`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTimerRequest {
    /// Channel whose status board shows this timer
    pub channel: String,
    pub audience: Audience,
    /// Stage cycle; the server default when omitted
    #[serde(default)]
    pub stages: Option<Vec<Stage>>,
}

/// Response for timer operations
#[derive(Debug, Clone, Serialize)]
pub struct TimerResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub timer: Option<TimerSnapshot>,
}

impl TimerResponse {
    pub fn ok(message: String, timer: Option<TimerSnapshot>) -> Self {
        Self {
            status: "ok".to_string(),
            message,
            timestamp: Utc::now(),
            timer,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            status: "error".to_string(),
            message,
            timestamp: Utc::now(),
            timer: None,
        }
    }
}

/// Status board content for one channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardResponse {
    pub channel: String,
    pub content: Option<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime: String,
    /// Address the server was bound to
    pub address: String,
    pub timers: usize,
}

impl HealthResponse {
    pub fn ok(uptime: String, address: String, timers: usize) -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime,
            address,
            timers,
        }
    }
}
