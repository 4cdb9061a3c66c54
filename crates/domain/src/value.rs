//! Typed variable values shared by the store, conditions and triggers.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single typed variable value.
///
/// Equality is structural within a variant; values of different variants
/// never compare equal (`Number(1.0) != Bool(true)`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Bool(bool),
    Number(f64),
    String(String),
    Object(BTreeMap<String, VariableValue>),
}

impl VariableValue {
    /// Approximate size in characters, used to enforce the store's value limit.
    ///
    /// Strings count their characters, numbers and booleans the length of
    /// their textual rendering, objects the sum of their keys and members.
    #[must_use]
    pub fn approximate_size(&self) -> usize {
        match self {
            Self::String(s) => s.chars().count(),
            Self::Number(n) => n.to_string().len(),
            Self::Bool(b) => if *b { 4 } else { 5 },
            Self::Object(map) => map
                .iter()
                .map(|(key, value)| key.chars().count() + value.approximate_size())
                .sum(),
        }
    }

    /// Truthiness used by conditions without an `equals` operand.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::Object(map) => !map.is_empty(),
        }
    }

    /// Name of the variant, for error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Object(_) => "object",
        }
    }

    /// Whether every number in the value, nested ones included, is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Number(n) => n.is_finite(),
            Self::Object(map) => map.values().all(Self::is_finite),
            Self::Bool(_) | Self::String(_) => true,
        }
    }
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Object(map) => {
                f.write_str("{")?;
                for (idx, (key, value)) in map.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for VariableValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for VariableValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<BTreeMap<String, VariableValue>> for VariableValue {
    fn from(value: BTreeMap<String, VariableValue>) -> Self {
        Self::Object(value)
    }
}
