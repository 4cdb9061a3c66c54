//! Common error types used across the workspace.
//!
//! Each failure kind is its own typed error and converts into the
//! workspace-wide [`ScreenStateError`] via `#[from]`. Collaborator failures
//! (storage, dispatch) are carried as boxed sources so adapters keep their
//! own error types.

use crate::variable::Scope;

/// Boxed error coming from an external collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error for every operation of the store and the trigger engine.
#[derive(Debug, thiserror::Error)]
pub enum ScreenStateError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("type error")]
    Type(#[from] TypeError),

    #[error("missing variable")]
    MissingVariable(#[from] MissingVariableError),

    #[error("persistent storage error")]
    Storage(#[source] BoxError),

    #[error("action dispatch error")]
    Dispatch(#[source] BoxError),
}

impl ScreenStateError {
    /// Wrap a persistent storage failure.
    pub fn storage(err: impl Into<BoxError>) -> Self {
        Self::Storage(err.into())
    }

    /// Wrap an action dispatcher failure.
    pub fn dispatch(err: impl Into<BoxError>) -> Self {
        Self::Dispatch(err.into())
    }
}

/// A value or definition was rejected before anything was written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("value for `{key}` is {size} characters, limit is {limit}")]
    ValueTooLarge {
        key: String,
        size: usize,
        limit: usize,
    },

    #[error("value for `{key}` contains a non-finite number")]
    NonFiniteNumber { key: String },

    #[error("identifier must not be empty")]
    EmptyId,

    #[error("variable key must not be empty")]
    EmptyKey,

    #[error("{field} must not be negative, got {value}")]
    NegativeDuration { field: &'static str, value: i64 },
}

/// `increment` targeted a stored value that is not a number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot increment `{key}`: stored value is a {found}, not a number")]
pub struct TypeError {
    pub key: String,
    pub found: &'static str,
}

/// A condition binding resolved to nothing while its missing behaviour is `Error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("variable `{key}` ({scope}) is not set")]
pub struct MissingVariableError {
    pub key: String,
    pub scope: Scope,
}
