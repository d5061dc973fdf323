//! # parent-store
//!
//! `parent-store` holds the parent record (`ParentInfo` with its
//! `ChildProfile`s) and two [`Store`] implementations for it:
//!
//! - [`MemoryStore`]: a map behind a mutex, optionally slowed down to behave
//!   like a remote store
//! - [`FileStore`]: a json file on disk, one object keyed by parent id
//!
//! The coordinators in `coordination` are what callers should use; the stores
//! are only the "remote" side they protect.
//!
//! [`Store`]: coordination::Store
//! [`MemoryStore`]: crate::memory::MemoryStore
//! [`FileStore`]: crate::file::FileStore
use std::{fmt, str::FromStr};

use coordination::Resource;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// id of a parent record, trimmed and never blank
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParentId(String);

impl ParentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl FromStr for ParentId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(StoreError::MissingId);
        }
        Ok(Self(s.to_owned()))
    }
}

impl TryFrom<String> for ParentId {
    type Error = StoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ParentId> for String {
    fn from(id: ParentId) -> Self {
        id.0
    }
}

impl fmt::Display for ParentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChildProfile {
    pub id: String,
    pub name: String,
    /// key into the avatar table the UI ships with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// consecutive days with a check-in
    #[serde(default)]
    pub streak: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParentInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ParentId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default)]
    pub children: Vec<ChildProfile>,
}

impl Resource for ParentInfo {
    type Key = ParentId;

    fn key(&self) -> Option<&ParentId> {
        self.id.as_ref().filter(|id| !id.is_blank())
    }
}

/// what's known about a parent before their record exists, usually from sign-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentSeed {
    pub id: ParentId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl From<ParentSeed> for ParentInfo {
    fn from(seed: ParentSeed) -> Self {
        Self {
            id: Some(seed.id),
            name: seed.name,
            email: seed.email,
            ..Default::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record has no id")]
    MissingId,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
