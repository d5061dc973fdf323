use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use tracing::{debug, info};

pub mod wire;

pub use wire::Message;

/// validated coordination config
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoordinationConfig {
    fetch: FetchConfig,
    update: UpdateConfig,
    path: Option<PathBuf>,
}

/// settings for the fetch coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    create_missing: bool,
}

/// settings for the update coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateConfig {
    safety_timeout: Duration,
    notifications: wire::Notifications,
}

impl FetchConfig {
    pub fn new(create_missing: bool) -> Self {
        Self { create_missing }
    }
    /// should a missing record be created from the caller's seed
    pub fn create_missing(&self) -> bool {
        self.create_missing
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::new(wire::default_create_missing())
    }
}

impl UpdateConfig {
    pub fn new(safety_timeout: Duration) -> Self {
        Self {
            safety_timeout,
            notifications: wire::Notifications::default(),
        }
    }
    pub fn with_notifications(mut self, notifications: wire::Notifications) -> Self {
        self.notifications = notifications;
        self
    }
    /// how long a submission lock may be held before it's force-released
    pub fn safety_timeout(&self) -> Duration {
        self.safety_timeout
    }
    /// shown after a successful write
    pub fn saved(&self) -> &Message {
        &self.notifications.saved
    }
    /// shown after a failed write
    pub fn failed(&self) -> &Message {
        &self.notifications.failed
    }
    /// shown when a record is missing its id
    pub fn invalid(&self) -> &Message {
        &self.notifications.invalid
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl TryFrom<wire::Config> for CoordinationConfig {
    type Error = anyhow::Error;

    fn try_from(cfg: wire::Config) -> Result<Self> {
        let safety_timeout = cfg
            .update
            .safety_timeout
            .to_duration()
            .context("invalid update.safety_timeout")?;
        Ok(Self {
            fetch: FetchConfig::new(cfg.fetch.create_missing),
            update: UpdateConfig::new(safety_timeout).with_notifications(cfg.notifications),
            path: None,
        })
    }
}

impl CoordinationConfig {
    pub fn fetch(&self) -> FetchConfig {
        self.fetch
    }
    pub fn update(&self) -> &UpdateConfig {
        &self.update
    }
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Create a new config from the yaml wire format
    pub fn yaml<S: AsRef<str>>(input: S) -> Result<Self> {
        Self::try_from(serde_yaml::from_str::<wire::Config>(input.as_ref())?)
    }
    /// Create a new config from the json wire format
    pub fn json<S: AsRef<str>>(input: S) -> Result<Self> {
        Self::try_from(serde_json::from_str::<wire::Config>(input.as_ref())?)
    }
    /// attempts to decode the config first as JSON, then YAML, finally erroring if neither work
    pub fn parse_str<S: AsRef<str>>(s: S) -> Result<Self> {
        let config = match Self::json(s.as_ref()) {
            Ok(r) => r,
            Err(_err) => Self::yaml(s.as_ref())?,
        };
        debug!(?config);
        Ok(config)
    }
    /// read & decode the config at `path`
    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::parse_str(
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to find config at {}", &path.display()))?,
        )
        .with_context(|| format!("failed to decode config at {}", &path.display()))?;
        config.path = Some(path.to_path_buf());
        Ok(config)
    }
    /// like [`parse`], but a missing file falls back to the defaults
    ///
    /// [`parse`]: CoordinationConfig::parse
    pub fn parse_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "no config file found, using defaults");
            return Ok(Self::default());
        }
        Self::parse(path)
    }
    /// the wire representation of this config, for printing
    pub fn to_wire(&self) -> wire::Config {
        wire::Config {
            fetch: wire::Fetch {
                create_missing: self.fetch.create_missing,
            },
            update: wire::Update {
                safety_timeout: wire::TimeoutDuration::String(format!(
                    "{}ms",
                    self.update.safety_timeout.as_millis()
                )),
            },
            notifications: self.update.notifications.clone(),
        }
    }
}
