//! # screenstate-adapter-storage-memory
//!
//! In-memory persistence adapter.
//!
//! ## Responsibilities
//! - Implement the `PersistentVariableStorage` port defined in
//!   `screenstate-app::ports::storage`
//! - Keep one row per variable slot (key, scope and owning screen)
//! - Let hosts and tests seed rows directly and simulate outages
//!
//! ## Dependency rule
//! Depends on `screenstate-app` (for port traits) and `screenstate-domain`
//! (for domain types). The `app` and `domain` crates must never reference
//! this adapter.

mod error;

pub use error::StorageError;

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use screenstate_app::ports::PersistentVariableStorage;
use screenstate_domain::error::ScreenStateError;
use screenstate_domain::id::ScreenId;
use screenstate_domain::variable::{Scope, StoredVariable, VariableKey};

/// Process-local `PersistentVariableStorage`.
#[derive(Debug)]
pub struct InMemoryVariableStorage {
    rows: Mutex<HashMap<VariableKey, StoredVariable>>,
    available: AtomicBool,
}

impl Default for InMemoryVariableStorage {
    fn default() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl InMemoryVariableStorage {
    /// Write a row directly, bypassing any variable store.
    ///
    /// Useful to stage what a reconciliation round will observe.
    pub fn insert_raw(&self, variable: StoredVariable, screen_id: Option<&ScreenId>) {
        let slot = VariableKey::new(variable.key.clone(), variable.scope, screen_id);
        self.lock_rows().insert(slot, variable);
    }

    /// Row stored for a slot, if any.
    #[must_use]
    pub fn get_raw(
        &self,
        key: &str,
        scope: Scope,
        screen_id: Option<&ScreenId>,
    ) -> Option<StoredVariable> {
        self.lock_rows()
            .get(&VariableKey::new(key, scope, screen_id))
            .cloned()
    }

    /// Number of stored rows across every scope and screen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_rows().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_rows().is_empty()
    }

    /// Switch the storage on or off. Every call fails while it is off.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn lock_rows(&self) -> MutexGuard<'_, HashMap<VariableKey, StoredVariable>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_available(&self) -> Result<(), StorageError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable)
        }
    }
}

impl PersistentVariableStorage for InMemoryVariableStorage {
    fn load(
        &self,
        scope: Scope,
        screen_id: Option<&ScreenId>,
    ) -> impl Future<Output = Result<Vec<StoredVariable>, ScreenStateError>> + Send {
        let result = self.ensure_available().map(|()| {
            let owner = scope.owner(screen_id);
            self.lock_rows()
                .iter()
                .filter(|(slot, _)| slot.scope == scope && slot.screen_id.as_ref() == owner)
                .map(|(_, variable)| variable.clone())
                .collect::<Vec<_>>()
        });
        if let Ok(rows) = &result {
            tracing::trace!(%scope, ?screen_id, count = rows.len(), "loaded variables");
        }
        async move { Ok(result?) }
    }

    fn save(
        &self,
        variable: StoredVariable,
        screen_id: Option<&ScreenId>,
    ) -> impl Future<Output = Result<(), ScreenStateError>> + Send {
        let result = self
            .ensure_available()
            .map(|()| self.insert_raw(variable, screen_id));
        async move { Ok(result?) }
    }

    fn remove(
        &self,
        key: &str,
        scope: Scope,
        screen_id: Option<&ScreenId>,
    ) -> impl Future<Output = Result<(), ScreenStateError>> + Send {
        let result = self.ensure_available().map(|()| {
            self.lock_rows()
                .remove(&VariableKey::new(key, scope, screen_id));
        });
        async move { Ok(result?) }
    }
}
