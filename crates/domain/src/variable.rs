//! Stored variables — scoped, timestamped, optionally TTL-bound state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::ScreenId;
use crate::time::{Millis, is_expired};
use crate::value::VariableValue;

/// Visibility of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Shared by every screen.
    Global,
    /// Private to one screen id.
    Screen,
}

impl Scope {
    /// Screen owning a slot of this scope; global slots have none.
    #[must_use]
    pub fn owner(self, screen_id: Option<&ScreenId>) -> Option<&ScreenId> {
        match self {
            Self::Global => None,
            Self::Screen => screen_id,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Screen => f.write_str("screen"),
        }
    }
}

/// Whether a write is mirrored to persistent storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    #[default]
    InMemory,
    Persistent,
}

/// How `sync_from_persistent` resolves a persisted copy against memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// The persisted copy always wins.
    DbAsSourceOfTruth,
    /// The persisted copy wins only when it is at least as recent.
    #[default]
    LastWriteWins,
}

impl ConflictStrategy {
    /// Decide whether `persisted` should replace what memory holds.
    #[must_use]
    pub fn should_replace(self, persisted: &StoredVariable, memory: Option<&StoredVariable>) -> bool {
        let Some(memory) = memory else {
            return true;
        };
        match self {
            Self::DbAsSourceOfTruth => true,
            Self::LastWriteWins => persisted.updated_at_millis >= memory.updated_at_millis,
        }
    }
}

/// A variable as held by the store and by persistent storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVariable {
    pub key: String,
    pub scope: Scope,
    pub value: VariableValue,
    pub updated_at_millis: Millis,
    #[serde(default)]
    pub policy: WritePolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_millis: Option<Millis>,
}

impl StoredVariable {
    /// Whether the TTL has elapsed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Millis) -> bool {
        is_expired(self.updated_at_millis, self.ttl_millis, now)
    }
}

/// Identity of a variable slot: `(key, scope, screen)`.
///
/// Global slots never carry a screen id, so the same global key seen from
/// two screens maps to one slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableKey {
    pub key: String,
    pub scope: Scope,
    pub screen_id: Option<ScreenId>,
}

impl VariableKey {
    #[must_use]
    pub fn new(key: impl Into<String>, scope: Scope, screen_id: Option<&ScreenId>) -> Self {
        Self {
            key: key.into(),
            scope,
            screen_id: scope.owner(screen_id).cloned(),
        }
    }
}

impl fmt::Display for VariableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.screen_id {
            Some(screen) => write!(f, "{}:{}@{screen}", self.scope, self.key),
            None => write!(f, "{}:{}", self.scope, self.key),
        }
    }
}
