//! Trigger source — what activates a trigger.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::ScreenId;
use crate::variable::{Scope, VariableKey};

/// Screen lifecycle events reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenEventType {
    OnOpen,
    OnAppear,
    OnFullyVisible,
    OnDisappear,
    RefreshCompleted,
    LoadNextPageCompleted,
}

impl ScreenEventType {
    pub const ALL: [Self; 6] = [
        Self::OnOpen,
        Self::OnAppear,
        Self::OnFullyVisible,
        Self::OnDisappear,
        Self::RefreshCompleted,
        Self::LoadNextPageCompleted,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnOpen => "on_open",
            Self::OnAppear => "on_appear",
            Self::OnFullyVisible => "on_fully_visible",
            Self::OnDisappear => "on_disappear",
            Self::RefreshCompleted => "refresh_completed",
            Self::LoadNextPageCompleted => "load_next_page_completed",
        }
    }
}

impl fmt::Display for ScreenEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScreenEventType {
    type Err = UnknownScreenEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| UnknownScreenEvent(s.to_string()))
    }
}

/// Returned when parsing an unknown screen event name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown screen event `{0}`")]
pub struct UnknownScreenEvent(pub String);

/// Describes what activates a trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerSource {
    /// Fires when the value of a variable slot changes.
    VariableChanged {
        key: String,
        scope: Scope,
        /// Screen whose slot is observed; defaults to the engine's screen.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        screen_id: Option<ScreenId>,
    },
    /// Fires on a screen lifecycle event.
    ScreenEvent { event: ScreenEventType },
}

impl TriggerSource {
    /// The slot a `VariableChanged` source observes, resolved for `current` screen.
    ///
    /// Returns `None` for event sources.
    #[must_use]
    pub fn watched_key(&self, current: &ScreenId) -> Option<VariableKey> {
        match self {
            Self::VariableChanged {
                key,
                scope,
                screen_id,
            } => Some(VariableKey::new(
                key.clone(),
                *scope,
                Some(screen_id.as_ref().unwrap_or(current)),
            )),
            Self::ScreenEvent { .. } => None,
        }
    }

    /// Whether this source listens for the given lifecycle event.
    #[must_use]
    pub fn matches_event(&self, event: ScreenEventType) -> bool {
        matches!(self, Self::ScreenEvent { event: expected } if *expected == event)
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VariableChanged { key, scope, .. } => {
                write!(f, "variable_changed({scope}:{key})")
            }
            Self::ScreenEvent { event } => write!(f, "screen_event({event})"),
        }
    }
}
