//! Dispatcher-specific error type.

use screenstate_domain::error::ScreenStateError;

/// Errors raised while interpreting an action payload.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The payload names a known action but its members do not fit it.
    #[error("malformed `{kind}` action")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<DispatchError> for ScreenStateError {
    fn from(err: DispatchError) -> Self {
        Self::dispatch(err)
    }
}
