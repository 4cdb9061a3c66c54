//! Typed view over the action payloads this adapter understands.

use serde::Deserialize;

use screenstate_domain::time::Millis;
use screenstate_domain::trigger::Action;
use screenstate_domain::value::VariableValue;
use screenstate_domain::variable::{Scope, WritePolicy};

use crate::error::DispatchError;

/// Action `type` tags handled by [`StoreAction`].
pub const KINDS: [&str; 5] = [
    "set_variable",
    "increment_variable",
    "remove_variable",
    "delay",
    "log",
];

fn default_scope() -> Scope {
    Scope::Global
}

fn default_delta() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreAction {
    SetVariable {
        key: String,
        value: VariableValue,
        #[serde(default = "default_scope")]
        scope: Scope,
        #[serde(default)]
        policy: WritePolicy,
        #[serde(default)]
        ttl_ms: Option<Millis>,
    },
    IncrementVariable {
        key: String,
        #[serde(default = "default_delta")]
        delta: f64,
        #[serde(default = "default_scope")]
        scope: Scope,
        #[serde(default)]
        policy: WritePolicy,
    },
    RemoveVariable {
        key: String,
        #[serde(default = "default_scope")]
        scope: Scope,
    },
    Delay {
        ms: u64,
    },
    Log {
        message: String,
    },
}

impl StoreAction {
    /// Parse an action this adapter handles.
    ///
    /// Returns `Ok(None)` for any other `type`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Malformed`] when the `type` is handled here
    /// but the payload does not match it.
    pub fn parse(action: &Action) -> Result<Option<Self>, DispatchError> {
        let Some(kind) = action.kind().filter(|kind| KINDS.contains(kind)) else {
            return Ok(None);
        };
        serde_json::from_value(action.payload().clone())
            .map(Some)
            .map_err(|source| DispatchError::Malformed {
                kind: kind.to_string(),
                source,
            })
    }
}
