//! Storage-specific error type.

use screenstate_domain::error::ScreenStateError;

/// Errors originating from the in-memory storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The storage was switched offline with
    /// [`set_available`](crate::InMemoryVariableStorage::set_available).
    #[error("storage is unavailable")]
    Unavailable,
}

impl From<StorageError> for ScreenStateError {
    fn from(err: StorageError) -> Self {
        Self::storage(err)
    }
}
