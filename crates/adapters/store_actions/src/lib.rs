//! # screenstate-adapter-store-actions
//!
//! Action dispatcher that interprets state-mutating actions against a
//! [`VariableStore`].
//!
//! ## Handled action types
//!
//! | `type` | Members | Effect |
//! |--------|---------|--------|
//! | `set_variable` | `key`, `value`, `scope`?, `policy`?, `ttl_ms`? | [`VariableStore::set`] |
//! | `increment_variable` | `key`, `delta`? (1), `scope`?, `policy`? | [`VariableStore::increment`] |
//! | `remove_variable` | `key`, `scope`? | [`VariableStore::remove`] |
//! | `delay` | `ms` | Sleeps before the next action of the trigger |
//! | `log` | `message` | Emits a tracing event |
//!
//! `scope` defaults to `global`; `screen` targets the firing screen. Any
//! other action type goes to the fallback dispatcher, which by default logs
//! and ignores it.
//!
//! ## Dependency rule
//!
//! Depends on `screenstate-app` (port traits, store) and `screenstate-domain`
//! only.

mod action;
mod error;

pub use action::StoreAction;
pub use error::DispatchError;

use std::future::Future;
use std::time::Duration;

use screenstate_app::ports::{ActionDispatcher, ExecutionContext, PersistentVariableStorage};
use screenstate_app::variable_store::VariableStore;
use screenstate_domain::error::ScreenStateError;
use screenstate_domain::trigger::Action;

/// Fallback that logs unknown actions and reports success.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreUnknown;

impl ActionDispatcher for IgnoreUnknown {
    fn dispatch(
        &self,
        action: &Action,
        context: &ExecutionContext,
    ) -> impl Future<Output = Result<(), ScreenStateError>> + Send {
        tracing::debug!(
            kind = action.kind().unwrap_or("<none>"),
            trigger_id = %context.trigger_id,
            "ignoring unhandled action"
        );
        async { Ok(()) }
    }
}

/// Dispatcher applying store actions to a variable store.
pub struct StoreActionDispatcher<S, F = IgnoreUnknown> {
    store: VariableStore<S>,
    fallback: F,
}

impl<S> StoreActionDispatcher<S> {
    #[must_use]
    pub fn new(store: &VariableStore<S>) -> Self {
        Self {
            store: store.clone(),
            fallback: IgnoreUnknown,
        }
    }
}

impl<S, F> StoreActionDispatcher<S, F> {
    /// Hand unhandled action types to `fallback` (navigation, analytics, …).
    #[must_use]
    pub fn with_fallback<G: ActionDispatcher>(self, fallback: G) -> StoreActionDispatcher<S, G> {
        StoreActionDispatcher {
            store: self.store,
            fallback,
        }
    }
}

impl<S, F> StoreActionDispatcher<S, F>
where
    S: PersistentVariableStorage,
    F: ActionDispatcher,
{
    async fn execute(&self, action: &Action, context: &ExecutionContext) -> Result<(), ScreenStateError> {
        let Some(parsed) = StoreAction::parse(action)? else {
            return self.fallback.dispatch(action, context).await;
        };
        let screen_id = Some(&context.screen_id);
        match parsed {
            StoreAction::SetVariable {
                key,
                value,
                scope,
                policy,
                ttl_ms,
            } => {
                self.store
                    .set(&key, value, scope, screen_id, policy, ttl_ms)
                    .await
            }
            StoreAction::IncrementVariable {
                key,
                delta,
                scope,
                policy,
            } => {
                self.store
                    .increment(&key, delta, scope, screen_id, policy)
                    .await
                    .map(|_| ())
            }
            StoreAction::RemoveVariable { key, scope } => {
                self.store.remove(&key, scope, screen_id).await
            }
            StoreAction::Delay { ms } => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(())
            }
            StoreAction::Log { message } => {
                tracing::info!(
                    screen_id = %context.screen_id,
                    trigger_id = %context.trigger_id,
                    "{message}"
                );
                Ok(())
            }
        }
    }
}

impl<S, F> ActionDispatcher for StoreActionDispatcher<S, F>
where
    S: PersistentVariableStorage,
    F: ActionDispatcher,
{
    fn dispatch(
        &self,
        action: &Action,
        context: &ExecutionContext,
    ) -> impl Future<Output = Result<(), ScreenStateError>> + Send {
        self.execute(action, context)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;
    use screenstate_adapter_storage_memory::InMemoryVariableStorage;
    use screenstate_app::config::StoreConfig;
    use screenstate_domain::id::{ScreenId, TriggerId};
    use screenstate_domain::value::VariableValue;
    use screenstate_domain::variable::Scope;

    // ── Spy fallback ───────────────────────────────────────────────

    #[derive(Default)]
    struct SpyFallback {
        seen: Mutex<Vec<Action>>,
    }

    impl ActionDispatcher for SpyFallback {
        fn dispatch(
            &self,
            action: &Action,
            _context: &ExecutionContext,
        ) -> impl Future<Output = Result<(), ScreenStateError>> + Send {
            self.seen.lock().unwrap().push(action.clone());
            async { Ok(()) }
        }
    }

    // ── Helpers ────────────────────────────────────────────────────

    type Store = VariableStore<Arc<InMemoryVariableStorage>>;

    fn setup() -> (Store, Arc<InMemoryVariableStorage>) {
        let storage = Arc::new(InMemoryVariableStorage::default());
        let store = VariableStore::builder(Arc::clone(&storage))
            .config(StoreConfig::manual_sync())
            .build();
        (store, storage)
    }

    fn context() -> ExecutionContext {
        ExecutionContext {
            screen_id: ScreenId::new("home"),
            trigger_id: TriggerId::new("t1"),
        }
    }

    async fn run<S: PersistentVariableStorage, F: ActionDispatcher>(
        dispatcher: &StoreActionDispatcher<S, F>,
        payload: serde_json::Value,
    ) -> Result<(), ScreenStateError> {
        dispatcher.dispatch(&Action::new(payload), &context()).await
    }

    // ── Tests ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn should_set_variable_for_firing_screen() {
        let (store, _) = setup();
        let dispatcher = StoreActionDispatcher::new(&store);

        run(
            &dispatcher,
            json!({"type": "set_variable", "key": "tab", "value": "reviews", "scope": "screen"}),
        )
        .await
        .unwrap();

        let home = ScreenId::new("home");
        assert_eq!(
            store.peek("tab", Scope::Screen, Some(&home)),
            Some(VariableValue::from("reviews"))
        );
    }

    #[tokio::test]
    async fn should_persist_when_policy_asks_for_it() {
        let (store, storage) = setup();
        let dispatcher = StoreActionDispatcher::new(&store);

        run(
            &dispatcher,
            json!({"type": "set_variable", "key": "consent", "value": true, "policy": "persistent"}),
        )
        .await
        .unwrap();

        assert!(storage.get_raw("consent", Scope::Global, None).is_some());
    }

    #[tokio::test]
    async fn should_increment_and_remove() {
        let (store, _) = setup();
        let dispatcher = StoreActionDispatcher::new(&store);

        run(&dispatcher, json!({"type": "increment_variable", "key": "visits"}))
            .await
            .unwrap();
        run(&dispatcher, json!({"type": "increment_variable", "key": "visits", "delta": 2}))
            .await
            .unwrap();
        assert_eq!(store.peek("visits", Scope::Global, None), Some(3.0.into()));

        run(&dispatcher, json!({"type": "remove_variable", "key": "visits"}))
            .await
            .unwrap();
        assert_eq!(store.peek("visits", Scope::Global, None), None);
    }

    #[tokio::test]
    async fn should_surface_store_errors() {
        let (store, _) = setup();
        let dispatcher = StoreActionDispatcher::new(&store);
        run(&dispatcher, json!({"type": "set_variable", "key": "name", "value": "ada"}))
            .await
            .unwrap();

        let result = run(&dispatcher, json!({"type": "increment_variable", "key": "name"})).await;

        assert!(matches!(result, Err(ScreenStateError::Type(_))));
    }

    #[tokio::test]
    async fn should_report_malformed_payload_as_dispatch_error() {
        let (store, _) = setup();
        let dispatcher = StoreActionDispatcher::new(&store);

        let result = run(&dispatcher, json!({"type": "set_variable", "value": 1})).await;

        assert!(matches!(result, Err(ScreenStateError::Dispatch(_))));
    }

    #[tokio::test]
    async fn should_wait_for_delay() {
        let (store, _) = setup();
        let dispatcher = StoreActionDispatcher::new(&store);
        let started = std::time::Instant::now();

        run(&dispatcher, json!({"type": "delay", "ms": 20})).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn should_ignore_unknown_actions_by_default() {
        let (store, _) = setup();
        let dispatcher = StoreActionDispatcher::new(&store);

        run(&dispatcher, json!({"type": "navigate", "to": "cart"}))
            .await
            .unwrap();
        run(&dispatcher, json!({"type": "log", "message": "hello"}))
            .await
            .unwrap();

        assert_eq!(store.version(), 0);
    }

    #[tokio::test]
    async fn should_forward_unknown_actions_to_fallback() {
        let (store, _) = setup();
        let spy = Arc::new(SpyFallback::default());
        let dispatcher = StoreActionDispatcher::new(&store).with_fallback(Arc::clone(&spy));

        run(&dispatcher, json!({"type": "navigate", "to": "cart"}))
            .await
            .unwrap();
        run(&dispatcher, json!({"type": "increment_variable", "key": "visits"}))
            .await
            .unwrap();

        let seen = spy.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind(), Some("navigate"));
    }
}
