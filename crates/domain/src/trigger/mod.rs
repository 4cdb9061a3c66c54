//! Trigger — source → condition → actions rules attached to a screen.
//!
//! A trigger has a [`TriggerSource`] that determines when it is considered,
//! an optional [`Condition`] that must hold, an ordered list of [`Action`]s
//! to dispatch, and guard settings (execution cap, debounce, throttle)
//! tracked per engine session by an [`ExecutionGuard`].

mod action;
mod guard;
mod source;

pub use action::Action;
pub use guard::{ExecutionGuard, GuardVerdict};
pub use source::{ScreenEventType, TriggerSource, UnknownScreenEvent};

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::error::{ScreenStateError, ValidationError};
use crate::id::TriggerId;
use crate::time::Millis;

/// Default cap on executions per engine session.
pub const DEFAULT_MAX_EXECUTIONS: u32 = 10;

fn default_max_executions() -> u32 {
    DEFAULT_MAX_EXECUTIONS
}

/// A rule that dispatches actions when its source fires and its condition holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: TriggerId,
    pub source: TriggerSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<Millis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle_ms: Option<Millis>,
    /// `0` disables the cap.
    #[serde(default = "default_max_executions")]
    pub max_executions: u32,
}

impl Trigger {
    /// Create a builder for constructing a [`Trigger`].
    #[must_use]
    pub fn builder() -> TriggerBuilder {
        TriggerBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenStateError::Validation`] when:
    /// - `id` is empty ([`ValidationError::EmptyId`])
    /// - a watched variable key is empty ([`ValidationError::EmptyKey`])
    /// - `debounce_ms` or `throttle_ms` is negative ([`ValidationError::NegativeDuration`])
    pub fn validate(&self) -> Result<(), ScreenStateError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId.into());
        }
        if let TriggerSource::VariableChanged { key, .. } = &self.source
            && key.is_empty()
        {
            return Err(ValidationError::EmptyKey.into());
        }
        for (field, value) in [("debounce_ms", self.debounce_ms), ("throttle_ms", self.throttle_ms)] {
            if let Some(value) = value.filter(|v| *v < 0) {
                return Err(ValidationError::NegativeDuration { field, value }.into());
            }
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Trigger`].
#[derive(Debug, Default)]
pub struct TriggerBuilder {
    id: Option<TriggerId>,
    source: Option<TriggerSource>,
    condition: Option<Condition>,
    actions: Vec<Action>,
    debounce_ms: Option<Millis>,
    throttle_ms: Option<Millis>,
    max_executions: Option<u32>,
}

impl TriggerBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<TriggerId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn source(mut self, source: TriggerSource) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    #[must_use]
    pub fn action(mut self, action: impl Into<Action>) -> Self {
        self.actions.push(action.into());
        self
    }

    #[must_use]
    pub fn debounce_ms(mut self, ms: Millis) -> Self {
        self.debounce_ms = Some(ms);
        self
    }

    #[must_use]
    pub fn throttle_ms(mut self, ms: Millis) -> Self {
        self.throttle_ms = Some(ms);
        self
    }

    #[must_use]
    pub fn max_executions(mut self, max: u32) -> Self {
        self.max_executions = Some(max);
        self
    }

    /// Consume the builder, validate, and return a [`Trigger`].
    ///
    /// A missing source defaults to the `on_open` screen event.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenStateError::Validation`] if the id is missing or a field is invalid.
    pub fn build(self) -> Result<Trigger, ScreenStateError> {
        let trigger = Trigger {
            id: self.id.unwrap_or_else(|| TriggerId::new("")),
            source: self.source.unwrap_or(TriggerSource::ScreenEvent {
                event: ScreenEventType::OnOpen,
            }),
            condition: self.condition,
            actions: self.actions,
            debounce_ms: self.debounce_ms,
            throttle_ms: self.throttle_ms,
            max_executions: self.max_executions.unwrap_or(DEFAULT_MAX_EXECUTIONS),
        };
        trigger.validate()?;
        Ok(trigger)
    }
}
