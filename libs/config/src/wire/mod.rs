//! the on-disk config format, before validation
use std::time::Duration;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// top-level config type
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub fetch: Fetch,
    pub update: Update,
    pub notifications: Notifications,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Fetch {
    /// create a record from the caller's seed when the read finds nothing
    #[serde(default = "default_create_missing")]
    pub create_missing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Update {
    /// seconds (or "10s", "500ms", "1m") before a held submission lock is force-released
    #[serde(default = "default_safety_timeout")]
    pub safety_timeout: TimeoutDuration,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Notifications {
    pub saved: Message,
    pub failed: Message,
    pub invalid: Message,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Message {
    pub title: String,
    pub message: String,
}

pub const fn default_create_missing() -> bool {
    true
}

/// 10 seconds
pub const fn default_safety_timeout() -> TimeoutDuration {
    TimeoutDuration::Seconds(10)
}

impl Default for Fetch {
    fn default() -> Self {
        Self {
            create_missing: default_create_missing(),
        }
    }
}

impl Default for Update {
    fn default() -> Self {
        Self {
            safety_timeout: default_safety_timeout(),
        }
    }
}

impl Default for Notifications {
    fn default() -> Self {
        Self {
            saved: Message::new("Success", "Your information has been updated."),
            failed: Message::new("Error", "Failed to update your information. Please try again."),
            invalid: Message::new("Error", "Missing parent information. Please sign in again."),
        }
    }
}

impl Message {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TimeoutDuration {
    Seconds(u64),
    String(String),
}

impl TimeoutDuration {
    /// resolve to a non-zero `Duration`
    pub fn to_duration(&self) -> Result<Duration> {
        let d = match self {
            TimeoutDuration::Seconds(secs) => Duration::from_secs(*secs),
            TimeoutDuration::String(s) => env_parser::parse_duration(s)?,
        };
        if d.is_zero() {
            bail!("safety_timeout cannot be zero");
        }
        Ok(d)
    }
}
