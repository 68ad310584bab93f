//! Stage data model

use std::{collections::BTreeMap, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One named, timed phase of a timer's cycle.
///
/// Durations are stored in minutes and converted to seconds only through
/// [`Stage::duration_secs`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    /// Length of the stage in minutes
    #[serde(rename = "duration")]
    pub duration_minutes: u32,
    /// Extra text appended to the stage-start notification
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub focus: bool,
    /// Named flags interpreted by collaborators, never by the engine
    #[serde(default)]
    pub modifiers: BTreeMap<String, bool>,
}

impl Stage {
    pub fn new(name: impl Into<String>, duration_minutes: u32) -> Self {
        Self {
            name: name.into(),
            duration_minutes,
            message: String::new(),
            focus: false,
            modifiers: BTreeMap::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_focus(mut self, focus: bool) -> Self {
        self.focus = focus;
        self
    }

    pub fn with_modifier(mut self, key: impl Into<String>, value: bool) -> Self {
        self.modifiers.insert(key.into(), value);
        self
    }

    /// Stage length in seconds
    pub fn duration_secs(&self) -> i64 {
        i64::from(self.duration_minutes) * 60
    }

    /// Look up a modifier, treating absent entries as unset
    pub fn modifier(&self, key: &str) -> bool {
        self.modifiers.get(key).copied().unwrap_or(false)
    }
}

/// Parses `NAME:MINUTES`, as used on the command line.
impl FromStr for Stage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, minutes) = s
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::MalformedStage(s.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::MalformedStage(s.to_string()));
        }
        let minutes = minutes
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidDuration {
                name: name.to_string(),
                value: minutes.to_string(),
            })?;
        Ok(Stage::new(name, minutes))
    }
}

/// Parse a comma separated stage list such as `Work:25,Break:5`
pub fn parse_stage_list(s: &str) -> Result<Vec<Stage>, ConfigError> {
    s.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect()
}
