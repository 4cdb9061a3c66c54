//! Storage port — persistence for stored variables.

use std::future::Future;

use screenstate_domain::error::ScreenStateError;
use screenstate_domain::id::ScreenId;
use screenstate_domain::variable::{Scope, StoredVariable};

/// Durable mirror of the variable store.
///
/// Global variables are addressed with `screen_id = None`; screen variables
/// with the owning screen's id. Implementations may be slow or eventually
/// consistent: the store only reads them during reconciliation.
pub trait PersistentVariableStorage: Send + Sync {
    /// Load every variable of a scope (and screen, for `Scope::Screen`).
    fn load(
        &self,
        scope: Scope,
        screen_id: Option<&ScreenId>,
    ) -> impl Future<Output = Result<Vec<StoredVariable>, ScreenStateError>> + Send;

    /// Insert or replace a variable.
    fn save(
        &self,
        variable: StoredVariable,
        screen_id: Option<&ScreenId>,
    ) -> impl Future<Output = Result<(), ScreenStateError>> + Send;

    /// Delete a variable. Deleting a missing variable is not an error.
    fn remove(
        &self,
        key: &str,
        scope: Scope,
        screen_id: Option<&ScreenId>,
    ) -> impl Future<Output = Result<(), ScreenStateError>> + Send;
}

impl<T: PersistentVariableStorage> PersistentVariableStorage for std::sync::Arc<T> {
    fn load(
        &self,
        scope: Scope,
        screen_id: Option<&ScreenId>,
    ) -> impl Future<Output = Result<Vec<StoredVariable>, ScreenStateError>> + Send {
        (**self).load(scope, screen_id)
    }

    fn save(
        &self,
        variable: StoredVariable,
        screen_id: Option<&ScreenId>,
    ) -> impl Future<Output = Result<(), ScreenStateError>> + Send {
        (**self).save(variable, screen_id)
    }

    fn remove(
        &self,
        key: &str,
        scope: Scope,
        screen_id: Option<&ScreenId>,
    ) -> impl Future<Output = Result<(), ScreenStateError>> + Send {
        (**self).remove(key, scope, screen_id)
    }
}
