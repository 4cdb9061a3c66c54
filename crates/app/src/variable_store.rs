//! Variable store — scoped, TTL-bound key/value state with a change signal.
//!
//! Memory is authoritative for reads. Writes with the `Persistent` policy are
//! mirrored to a [`PersistentVariableStorage`], and a background loop
//! periodically reconciles memory against it using the configured
//! [`ConflictStrategy`](screenstate_domain::variable::ConflictStrategy).
//!
//! Per-screen stores may share one global store: every `Global`-scope
//! operation is routed to that store, so all screens observe one global
//! truth and its write lock serializes writes coming from every screen.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use screenstate_domain::error::{ScreenStateError, TypeError, ValidationError};
use screenstate_domain::id::ScreenId;
use screenstate_domain::time::Millis;
use screenstate_domain::value::VariableValue;
use screenstate_domain::variable::{Scope, StoredVariable, VariableKey, WritePolicy};

use crate::change_signal::{ChangeSignal, ChangeSubscription};
use crate::config::StoreConfig;
use crate::ports::{Clock, PersistentVariableStorage, SystemClock};

/// Handle to a variable store. Cloning is cheap and shares the same state.
pub struct VariableStore<S> {
    inner: Arc<StoreInner<S>>,
}

impl<S> Clone for VariableStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct StoreInner<S> {
    storage: S,
    clock: Arc<dyn Clock>,
    config: StoreConfig,
    /// Screen reconciled by the background loop.
    screen_id: Option<ScreenId>,
    global: Option<Arc<StoreInner<S>>>,
    memory: Mutex<HashMap<VariableKey, StoredVariable>>,
    /// Serializes mutations; never taken by reads.
    write_lock: tokio::sync::Mutex<()>,
    signal: ChangeSignal,
    cancel: CancellationToken,
}

impl<S> Drop for StoreInner<S> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl<S> VariableStore<S> {
    /// Create a builder over the given persistent storage.
    #[must_use]
    pub fn builder(storage: S) -> VariableStoreBuilder<S> {
        VariableStoreBuilder {
            storage,
            clock: Arc::new(SystemClock),
            config: StoreConfig::default(),
            screen_id: None,
            global: None,
        }
    }

    /// Subscribe to changes of this store and of the shared global store.
    #[must_use]
    pub fn subscribe(&self) -> ChangeSubscription {
        ChangeSubscription::new(
            self.inner.signal.subscribe(),
            self.inner.global.as_ref().map(|g| g.signal.subscribe()),
        )
    }

    /// Current value of this store's change counter.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.signal.version()
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Stop the background sync loop. Idempotent.
    ///
    /// A reconciliation round already waiting on storage may finish its
    /// load, but its result is discarded. The shared global store is owned
    /// by the host and is not disposed.
    pub fn dispose(&self) {
        if !self.inner.cancel.is_cancelled() {
            tracing::info!(screen_id = ?self.inner.screen_id, "disposing variable store");
        }
        self.inner.cancel.cancel();
    }

    /// Non-suspending read. Expired variables are evicted and reported absent.
    #[must_use]
    pub fn peek(
        &self,
        key: &str,
        scope: Scope,
        screen_id: Option<&ScreenId>,
    ) -> Option<VariableValue> {
        self.target(scope).peek(key, scope, screen_id)
    }

    fn target(&self, scope: Scope) -> &StoreInner<S> {
        match (scope, &self.inner.global) {
            (Scope::Global, Some(global)) => global,
            _ => &self.inner,
        }
    }
}

impl<S: PersistentVariableStorage> VariableStore<S> {
    /// Read a variable.
    ///
    /// Reads never wait on persistent storage; this is [`peek`](Self::peek)
    /// for callers that are already async.
    #[allow(clippy::unused_async)]
    pub async fn get(
        &self,
        key: &str,
        scope: Scope,
        screen_id: Option<&ScreenId>,
    ) -> Option<VariableValue> {
        self.peek(key, scope, screen_id)
    }

    /// Write a variable and bump the change signal.
    ///
    /// The signal is bumped even when the value is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenStateError::Validation`] if the key is empty, the
    /// value holds a non-finite number or exceeds the configured size
    /// (nothing is written), or
    /// [`ScreenStateError::Storage`] if mirroring a `Persistent` write failed
    /// (memory is updated regardless).
    #[tracing::instrument(skip(self, value))]
    pub async fn set(
        &self,
        key: &str,
        value: VariableValue,
        scope: Scope,
        screen_id: Option<&ScreenId>,
        policy: WritePolicy,
        ttl_millis: Option<Millis>,
    ) -> Result<(), ScreenStateError> {
        let target = self.target(scope);
        target.validate(key, &value)?;
        let _write = target.write_lock.lock().await;
        target
            .write_locked(key, value, scope, screen_id, policy, ttl_millis)
            .await
    }

    /// Add `delta` to a numeric variable, treating a missing one as `0`.
    ///
    /// The read and the write happen under the store's write lock, so
    /// concurrent increments never lose updates. Returns the new value.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenStateError::Type`] if the current value is not a
    /// number, plus the errors of [`set`](Self::set).
    #[tracing::instrument(skip(self))]
    pub async fn increment(
        &self,
        key: &str,
        delta: f64,
        scope: Scope,
        screen_id: Option<&ScreenId>,
        policy: WritePolicy,
    ) -> Result<VariableValue, ScreenStateError> {
        let target = self.target(scope);
        let _write = target.write_lock.lock().await;
        let next = match target.peek(key, scope, screen_id) {
            None => delta,
            Some(VariableValue::Number(current)) => current + delta,
            Some(other) => {
                return Err(TypeError {
                    key: key.to_string(),
                    found: other.type_name(),
                }
                .into());
            }
        };
        let value = VariableValue::Number(next);
        target.validate(key, &value)?;
        target
            .write_locked(key, value.clone(), scope, screen_id, policy, None)
            .await?;
        Ok(value)
    }

    /// Delete a variable from memory and persistent storage. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenStateError::Storage`] if the storage delete failed
    /// (memory is cleared regardless).
    #[tracing::instrument(skip(self))]
    pub async fn remove(
        &self,
        key: &str,
        scope: Scope,
        screen_id: Option<&ScreenId>,
    ) -> Result<(), ScreenStateError> {
        let target = self.target(scope);
        let _write = target.write_lock.lock().await;
        {
            let mut memory = target.lock_memory();
            memory.remove(&VariableKey::new(key, scope, screen_id));
        }
        let result = target.storage.remove(key, scope, scope.owner(screen_id)).await;
        target.signal.bump();
        if let Err(err) = &result {
            tracing::warn!(%err, key, %scope, "failed to remove persisted variable");
        }
        result
    }

    /// Reconcile memory with persistent storage.
    ///
    /// Global variables are always synced (through the shared global store
    /// when one is configured); screen variables only when `screen_id` is
    /// given. A disposed store does nothing.
    ///
    /// # Errors
    ///
    /// Returns the first [`ScreenStateError::Storage`] raised while loading.
    /// A failing scope does not prevent the other from syncing.
    #[tracing::instrument(skip(self))]
    pub async fn sync_from_persistent(
        &self,
        screen_id: Option<&ScreenId>,
    ) -> Result<(), ScreenStateError> {
        if self.is_disposed() {
            return Ok(());
        }
        let global = self.target(Scope::Global).merge_scope(Scope::Global, None).await;
        let screen = match screen_id {
            Some(screen_id) => self
                .inner
                .merge_scope(Scope::Screen, Some(screen_id))
                .await,
            None => Ok(()),
        };
        global.and(screen)
    }
}

impl<S> StoreInner<S> {
    fn lock_memory(&self) -> MutexGuard<'_, HashMap<VariableKey, StoredVariable>> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn peek(&self, key: &str, scope: Scope, screen_id: Option<&ScreenId>) -> Option<VariableValue> {
        let slot = VariableKey::new(key, scope, screen_id);
        let now = self.clock.now_millis();
        let mut memory = self.lock_memory();
        let expired = memory.get(&slot)?.is_expired(now);
        if expired {
            memory.remove(&slot);
            tracing::trace!(%slot, "evicted expired variable on read");
            return None;
        }
        memory.get(&slot).map(|variable| variable.value.clone())
    }

    fn validate(&self, key: &str, value: &VariableValue) -> Result<(), ValidationError> {
        if key.is_empty() {
            return Err(ValidationError::EmptyKey);
        }
        if !value.is_finite() {
            return Err(ValidationError::NonFiniteNumber {
                key: key.to_string(),
            });
        }
        let size = value.approximate_size();
        if size > self.config.max_value_size {
            return Err(ValidationError::ValueTooLarge {
                key: key.to_string(),
                size,
                limit: self.config.max_value_size,
            });
        }
        Ok(())
    }
}

impl<S: PersistentVariableStorage> StoreInner<S> {
    /// Apply a write. The caller holds `write_lock`.
    async fn write_locked(
        &self,
        key: &str,
        value: VariableValue,
        scope: Scope,
        screen_id: Option<&ScreenId>,
        policy: WritePolicy,
        ttl_millis: Option<Millis>,
    ) -> Result<(), ScreenStateError> {
        let variable = StoredVariable {
            key: key.to_string(),
            scope,
            value,
            updated_at_millis: self.clock.now_millis(),
            policy,
            ttl_millis,
        };
        {
            let mut memory = self.lock_memory();
            memory.insert(VariableKey::new(key, scope, screen_id), variable.clone());
        }
        let persisted = match policy {
            WritePolicy::Persistent => self.storage.save(variable, scope.owner(screen_id)).await,
            WritePolicy::InMemory => Ok(()),
        };
        self.signal.bump();
        if let Err(err) = &persisted {
            tracing::warn!(%err, key, %scope, "failed to persist variable");
        }
        persisted
    }

    /// Load one scope from storage and merge it into memory.
    async fn merge_scope(
        &self,
        scope: Scope,
        screen_id: Option<&ScreenId>,
    ) -> Result<(), ScreenStateError> {
        if self.cancel.is_cancelled() {
            return Ok(());
        }
        let persisted = self.storage.load(scope, screen_id).await?;

        let _write = self.write_lock.lock().await;
        if self.cancel.is_cancelled() {
            tracing::debug!(%scope, "store disposed during load, discarding result");
            return Ok(());
        }
        let now = self.clock.now_millis();
        let strategy = self.config.conflict_strategy;
        let (applied, evicted) = {
            let mut memory = self.lock_memory();
            let mut applied = 0usize;
            for variable in persisted {
                if variable.scope != scope {
                    tracing::warn!(key = %variable.key, %scope, "skipping persisted variable from another scope");
                    continue;
                }
                let slot = VariableKey::new(variable.key.clone(), scope, screen_id);
                let current = memory.get(&slot).filter(|held| !held.is_expired(now));
                if strategy.should_replace(&variable, current) {
                    memory.insert(slot, variable);
                    applied += 1;
                }
            }
            let before = memory.len();
            memory.retain(|_, variable| !variable.is_expired(now));
            (applied, before - memory.len())
        };
        self.signal.bump();
        tracing::debug!(%scope, ?screen_id, applied, evicted, "merged persisted variables");
        Ok(())
    }
}

/// Step-by-step builder for [`VariableStore`].
pub struct VariableStoreBuilder<S> {
    storage: S,
    clock: Arc<dyn Clock>,
    config: StoreConfig,
    screen_id: Option<ScreenId>,
    global: Option<Arc<StoreInner<S>>>,
}

impl<S> VariableStoreBuilder<S> {
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Screen whose variables the background loop reconciles.
    #[must_use]
    pub fn screen(mut self, screen_id: impl Into<ScreenId>) -> Self {
        self.screen_id = Some(screen_id.into());
        self
    }

    /// Route every `Global`-scope operation to a shared store.
    #[must_use]
    pub fn global(mut self, global: &VariableStore<S>) -> Self {
        self.global = Some(Arc::clone(&global.inner));
        self
    }
}

impl<S: PersistentVariableStorage + 'static> VariableStoreBuilder<S> {
    /// Build the store, spawning the sync loop when enabled.
    ///
    /// A zero sync interval is raised to one second.
    ///
    /// Must be called within a tokio runtime when sync is enabled.
    #[must_use]
    pub fn build(self) -> VariableStore<S> {
        let inner = Arc::new(StoreInner {
            storage: self.storage,
            clock: self.clock,
            config: self.config,
            screen_id: self.screen_id,
            global: self.global,
            memory: Mutex::new(HashMap::new()),
            write_lock: tokio::sync::Mutex::new(()),
            signal: ChangeSignal::default(),
            cancel: CancellationToken::new(),
        });
        if inner.config.sync_enabled {
            spawn_sync_loop(&inner);
        }
        VariableStore { inner }
    }
}

/// Periodically reconcile the store until it is disposed or dropped.
///
/// The task holds only a weak reference between rounds so dropping every
/// handle ends the loop.
fn spawn_sync_loop<S: PersistentVariableStorage + 'static>(inner: &Arc<StoreInner<S>>) {
    let weak: Weak<StoreInner<S>> = Arc::downgrade(inner);
    let cancel = inner.cancel.clone();
    let interval = inner.config.sync_interval();
    if inner.config.sync_interval_secs == 0 {
        tracing::warn!("sync interval of zero seconds, using one second");
    }
    tracing::info!(
        interval_secs = interval.as_secs(),
        screen_id = ?inner.screen_id,
        "variable store sync loop started"
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let Some(inner) = weak.upgrade() else {
                break;
            };
            let store = VariableStore { inner };
            let screen_id = store.inner.screen_id.clone();
            if let Err(err) = store.sync_from_persistent(screen_id.as_ref()).await {
                tracing::warn!(%err, "variable sync failed, retrying next interval");
            }
        }
        tracing::debug!("variable store sync loop stopped");
    });
}
