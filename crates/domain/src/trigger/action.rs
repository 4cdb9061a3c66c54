//! Action — an opaque token handed to the action dispatcher when a trigger fires.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An action as described by the screen document.
///
/// The core never interprets actions; it only preserves their order and
/// passes them to the dispatcher. By convention the payload is a JSON object
/// whose `"type"` member names the action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(serde_json::Value);

impl Action {
    #[must_use]
    pub fn new(payload: serde_json::Value) -> Self {
        Self(payload)
    }

    /// The `"type"` member, when present.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.0.get("type").and_then(serde_json::Value::as_str)
    }

    /// Look up a member of the payload.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.0.get(field)
    }

    #[must_use]
    pub fn payload(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for Action {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => f.write_str(kind),
            None => f.write_str("<untyped>"),
        }
    }
}
