//! Bindings and conditions — declarative boolean tests over variables.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MissingVariableError;
use crate::value::VariableValue;
use crate::variable::Scope;

/// What a [`Binding`] resolves to when its variable is not set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingBehavior {
    /// Treat the value as not existing.
    #[default]
    Empty,
    /// Fall back to the binding's `default`.
    Default,
    /// Fail with [`MissingVariableError`].
    Error,
}

/// A named, scoped reference to a variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub key: String,
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<VariableValue>,
    #[serde(default)]
    pub missing: MissingBehavior,
}

impl Binding {
    /// Bind to a variable, treating a missing value as empty.
    #[must_use]
    pub fn new(key: impl Into<String>, scope: Scope) -> Self {
        Self {
            key: key.into(),
            scope,
            default: None,
            missing: MissingBehavior::Empty,
        }
    }

    /// Fall back to `default` when the variable is missing.
    #[must_use]
    pub fn or_default(mut self, default: impl Into<VariableValue>) -> Self {
        self.default = Some(default.into());
        self.missing = MissingBehavior::Default;
        self
    }

    /// Fail resolution when the variable is missing.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.missing = MissingBehavior::Error;
        self
    }

    /// Apply the missing behaviour to whatever the store returned.
    ///
    /// # Errors
    ///
    /// Returns [`MissingVariableError`] when `found` is `None` and the
    /// behaviour is [`MissingBehavior::Error`].
    pub fn resolve(
        &self,
        found: Option<VariableValue>,
    ) -> Result<Option<VariableValue>, MissingVariableError> {
        if found.is_some() {
            return Ok(found);
        }
        match self.missing {
            MissingBehavior::Empty => Ok(None),
            MissingBehavior::Default => Ok(self.default.clone()),
            MissingBehavior::Error => Err(MissingVariableError {
                key: self.key.clone(),
                scope: self.scope,
            }),
        }
    }
}

fn default_exists() -> bool {
    true
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_true(value: &bool) -> bool {
    *value
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

/// A boolean test over a binding's resolved value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub binding: Binding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<VariableValue>,
    #[serde(default = "default_exists", skip_serializing_if = "is_true")]
    pub exists: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub negate: bool,
}

impl Condition {
    /// Holds when the binding resolves to a truthy value.
    #[must_use]
    pub fn truthy(binding: Binding) -> Self {
        Self {
            binding,
            equals: None,
            exists: true,
            negate: false,
        }
    }

    /// Holds when the binding resolves to a value equal to `value`.
    #[must_use]
    pub fn equals(binding: Binding, value: impl Into<VariableValue>) -> Self {
        Self {
            equals: Some(value.into()),
            ..Self::truthy(binding)
        }
    }

    /// Holds when the binding resolves to nothing.
    #[must_use]
    pub fn absent(binding: Binding) -> Self {
        Self {
            exists: false,
            ..Self::truthy(binding)
        }
    }

    /// Invert the outcome.
    #[must_use]
    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    /// Outcome for an already resolved binding value.
    #[must_use]
    pub fn outcome(&self, resolved: Option<&VariableValue>) -> bool {
        let result = match resolved {
            None => !self.exists,
            Some(value) => match &self.equals {
                Some(expected) => value == expected,
                None => value.is_truthy(),
            },
        };
        result != self.negate
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negate {
            f.write_str("not ")?;
        }
        let target = format!("{}:{}", self.binding.scope, self.binding.key);
        match (&self.equals, self.exists) {
            (Some(expected), _) => write!(f, "{target} == {expected}"),
            (None, true) => write!(f, "{target}"),
            (None, false) => write!(f, "absent({target})"),
        }
    }
}
