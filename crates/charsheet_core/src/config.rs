//! Engine configuration.
//!
//! # Responsibility
//! - Carry the budget-cap table supplied by the embedding application.
//! - Carry persistence and registry limits.
//!
//! # Invariants
//! - Missing JSON fields fall back to `EngineConfig::default()` values.
//! - A group absent from `BudgetCaps` is not budget-limited.

use crate::model::schema::GroupId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage key of the persisted tab-session blob.
pub const DEFAULT_STORAGE_KEY: &str = "charsheet.tabs.v1";
/// Maximum entries kept per relationship kind.
pub const DEFAULT_RELATIONSHIP_CAP: usize = 50;

/// Points budget per allocation group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BudgetCaps(BTreeMap<GroupId, u32>);

impl BudgetCaps {
    /// Creates a cap table with no limited groups.
    pub fn unlimited() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with_cap(mut self, group: GroupId, cap: u32) -> Self {
        self.0.insert(group, cap);
        self
    }

    pub fn set(&mut self, group: GroupId, cap: u32) {
        self.0.insert(group, cap);
    }

    /// Cap of `group`, or `None` when the group is unlimited.
    pub fn cap(&self, group: GroupId) -> Option<u32> {
        self.0.get(&group).copied()
    }
}

impl Default for BudgetCaps {
    fn default() -> Self {
        Self::unlimited()
            .with_cap(GroupId::Body, 20)
            .with_cap(GroupId::Skills, 24)
            .with_cap(GroupId::Priorities, 10)
            .with_cap(GroupId::Mind, 12)
            .with_cap(GroupId::Social, 12)
    }
}

/// Runtime options of the sheet engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub caps: BudgetCaps,
    /// Key under which the tab session blob is stored.
    pub storage_key: String,
    /// Maximum entries per relationship kind; oldest entries are dropped.
    pub relationship_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            caps: BudgetCaps::default(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            relationship_cap: DEFAULT_RELATIONSHIP_CAP,
        }
    }
}

impl EngineConfig {
    /// Parses configuration JSON, e.g. `{"caps": {"body": 18}}`.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::InvalidJson)?;
        if config.storage_key.trim().is_empty() {
            return Err(ConfigError::EmptyStorageKey);
        }
        Ok(config)
    }
}

/// Configuration parse/validation error.
#[derive(Debug)]
pub enum ConfigError {
    InvalidJson(serde_json::Error),
    EmptyStorageKey,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidJson(err) => write!(f, "invalid engine config: {err}"),
            Self::EmptyStorageKey => write!(f, "storage_key must not be blank"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidJson(err) => Some(err),
            Self::EmptyStorageKey => None,
        }
    }
}
