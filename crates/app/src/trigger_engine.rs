//! Trigger engine — fires a screen's triggers on variable changes and
//! lifecycle events.
//!
//! One engine serves one screen. [`start`](TriggerEngine::start) opens a
//! session: per-trigger execution guards, a last-seen cache of every watched
//! variable slot and, when any trigger watches a variable, one observation
//! task driven by the store's change signal. [`stop`](TriggerEngine::stop)
//! discards the whole session, so caps and windows start fresh next time.
//!
//! A fire attempt checks the execution cap, then debounce, then throttle,
//! then the condition, and records the execution. Those steps run under one
//! lock so concurrent attempts cannot overshoot a cap or a window. Actions
//! are dispatched afterwards, in order, outside the lock.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use screenstate_domain::error::ScreenStateError;
use screenstate_domain::id::{ScreenId, TriggerId};
use screenstate_domain::trigger::{ExecutionGuard, GuardVerdict, ScreenEventType, Trigger};
use screenstate_domain::value::VariableValue;
use screenstate_domain::variable::VariableKey;

use crate::change_signal::ChangeSubscription;
use crate::condition_evaluator::ConditionEvaluator;
use crate::ports::{ActionDispatcher, Clock, ExecutionContext, PersistentVariableStorage, SystemClock};
use crate::variable_store::VariableStore;

const FAILURE_CHANNEL_CAPACITY: usize = 64;

/// A failure raised while firing a trigger outside of a caller's control.
#[derive(Debug, Clone)]
pub struct TriggerFailure {
    pub trigger_id: TriggerId,
    pub error: Arc<ScreenStateError>,
}

/// Reactive trigger engine for one screen.
pub struct TriggerEngine<S, D> {
    store: VariableStore<S>,
    dispatcher: Arc<D>,
    clock: Arc<dyn Clock>,
    screen_id: ScreenId,
    failures: broadcast::Sender<TriggerFailure>,
    session: Mutex<Option<Arc<Session<S, D>>>>,
}

impl<S, D> TriggerEngine<S, D>
where
    S: PersistentVariableStorage + 'static,
    D: ActionDispatcher + 'static,
{
    /// Create a stopped engine for `screen_id`.
    pub fn new(store: &VariableStore<S>, dispatcher: D, screen_id: impl Into<ScreenId>) -> Self {
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        Self {
            store: store.clone(),
            dispatcher: Arc::new(dispatcher),
            clock: Arc::new(SystemClock),
            screen_id: screen_id.into(),
            failures,
            session: Mutex::new(None),
        }
    }

    /// Replace the time source used for debounce and throttle windows.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Whether a session is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lock_session().is_some()
    }

    /// Failures from the observation task and from action dispatch.
    #[must_use]
    pub fn subscribe_failures(&self) -> broadcast::Receiver<TriggerFailure> {
        self.failures.subscribe()
    }

    /// Start a session with the given triggers, replacing any running one.
    ///
    /// Must be called within a tokio runtime when a trigger watches a
    /// variable.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenStateError::Validation`] if a trigger is malformed.
    /// The engine is left stopped in that case.
    #[tracing::instrument(skip(self, triggers), fields(screen_id = %self.screen_id, count = triggers.len()))]
    pub fn start(&self, triggers: Vec<Trigger>) -> Result<(), ScreenStateError> {
        self.stop();
        for trigger in &triggers {
            trigger.validate()?;
        }

        let watched: Vec<Option<VariableKey>> = triggers
            .iter()
            .map(|trigger| trigger.source.watched_key(&self.screen_id))
            .collect();
        let observes = watched.iter().any(Option::is_some);
        // Subscribe before priming so no write slips between the two.
        let subscription = observes.then(|| self.store.subscribe());

        let session = Arc::new(Session {
            guards: Mutex::new(vec![ExecutionGuard::default(); triggers.len()]),
            last_seen: Mutex::new(Vec::new()),
            triggers,
            watched,
            evaluator: ConditionEvaluator::new(&self.store, self.screen_id.clone()),
            store: self.store.clone(),
            dispatcher: Arc::clone(&self.dispatcher),
            clock: Arc::clone(&self.clock),
            screen_id: self.screen_id.clone(),
            failures: self.failures.clone(),
            cancel: CancellationToken::new(),
        });
        session.prime();

        if let Some(subscription) = subscription {
            tokio::spawn(Arc::clone(&session).observe(subscription));
        }
        *self.lock_session() = Some(session);
        tracing::info!("trigger engine started");
        Ok(())
    }

    /// Fire every trigger listening for `event`, in list order.
    ///
    /// Returns the ids of the triggers that fired. A stopped engine fires
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenStateError::MissingVariable`] from the first trigger
    /// whose condition requires an absent variable. Triggers after it are not
    /// attempted.
    #[tracing::instrument(skip(self), fields(screen_id = %self.screen_id))]
    pub async fn on_event(&self, event: ScreenEventType) -> Result<Vec<TriggerId>, ScreenStateError> {
        let Some(session) = self.lock_session().clone() else {
            tracing::debug!("engine stopped, ignoring screen event");
            return Ok(Vec::new());
        };
        let mut fired = Vec::new();
        for (index, trigger) in session.triggers.iter().enumerate() {
            if !trigger.source.matches_event(event) {
                continue;
            }
            if session.fire(index).await? {
                fired.push(trigger.id.clone());
            }
        }
        Ok(fired)
    }

    /// Stop the session. Idempotent.
    pub fn stop(&self) {
        if let Some(session) = self.lock_session().take() {
            session.cancel.cancel();
            tracing::info!(screen_id = %self.screen_id, "trigger engine stopped");
        }
    }
}

impl<S, D> TriggerEngine<S, D> {
    fn lock_session(&self) -> MutexGuard<'_, Option<Arc<Session<S, D>>>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S, D> Drop for TriggerEngine<S, D> {
    fn drop(&mut self) {
        if let Some(session) = self.lock_session().take() {
            session.cancel.cancel();
        }
    }
}

/// State of one started engine.
struct Session<S, D> {
    triggers: Vec<Trigger>,
    /// Watched slot of each trigger, aligned with `triggers`.
    watched: Vec<Option<VariableKey>>,
    guards: Mutex<Vec<ExecutionGuard>>,
    last_seen: Mutex<Vec<(VariableKey, Option<VariableValue>)>>,
    evaluator: ConditionEvaluator<S>,
    store: VariableStore<S>,
    dispatcher: Arc<D>,
    clock: Arc<dyn Clock>,
    screen_id: ScreenId,
    failures: broadcast::Sender<TriggerFailure>,
    cancel: CancellationToken,
}

impl<S, D> Session<S, D>
where
    S: PersistentVariableStorage + 'static,
    D: ActionDispatcher + 'static,
{
    fn read(&self, slot: &VariableKey) -> Option<VariableValue> {
        self.store
            .peek(&slot.key, slot.scope, slot.screen_id.as_ref())
    }

    fn prime(&self) {
        let mut slots: Vec<&VariableKey> = Vec::new();
        for slot in self.watched.iter().flatten() {
            if !slots.contains(&slot) {
                slots.push(slot);
            }
        }
        let primed = slots
            .into_iter()
            .map(|slot| (slot.clone(), self.read(slot)))
            .collect();
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = primed;
    }

    /// Slots whose value differs from the cache; the cache is updated.
    fn changed_slots(&self) -> HashSet<VariableKey> {
        let mut last_seen = self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
        let mut changed = HashSet::new();
        for (slot, seen) in last_seen.iter_mut() {
            let current = self.read(slot);
            if current != *seen {
                tracing::trace!(%slot, "watched variable changed");
                *seen = current;
                changed.insert(slot.clone());
            }
        }
        changed
    }

    async fn observe(self: Arc<Self>, mut subscription: ChangeSubscription) {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                alive = subscription.changed() => {
                    if !alive {
                        break;
                    }
                }
            }
            let changed = self.changed_slots();
            if changed.is_empty() {
                continue;
            }
            for index in 0..self.triggers.len() {
                if self.cancel.is_cancelled() {
                    break;
                }
                let watches_changed = self.watched[index]
                    .as_ref()
                    .is_some_and(|slot| changed.contains(slot));
                if !watches_changed {
                    continue;
                }
                if let Err(err) = self.fire(index).await {
                    tracing::warn!(%err, trigger_id = %self.triggers[index].id, "trigger failed");
                    self.report(&self.triggers[index].id, err);
                }
            }
        }
        tracing::debug!(screen_id = %self.screen_id, "trigger observation stopped");
    }

    /// Attempt to fire one trigger. Returns whether it fired.
    async fn fire(&self, index: usize) -> Result<bool, ScreenStateError> {
        let trigger = &self.triggers[index];
        let now = self.clock.now_millis();
        {
            let mut guards = self.guards.lock().unwrap_or_else(PoisonError::into_inner);
            let guard = &mut guards[index];
            let verdict = guard.check(trigger, now);
            if verdict != GuardVerdict::Admit {
                tracing::debug!(trigger_id = %trigger.id, ?verdict, "trigger skipped");
                return Ok(false);
            }
            if !self.evaluator.evaluate(trigger.condition.as_ref())? {
                tracing::debug!(trigger_id = %trigger.id, "trigger condition not met");
                return Ok(false);
            }
            guard.record(now);
            tracing::debug!(trigger_id = %trigger.id, executions = guard.executions, "trigger fired");
        }

        let context = ExecutionContext {
            screen_id: self.screen_id.clone(),
            trigger_id: trigger.id.clone(),
        };
        for action in &trigger.actions {
            if self.cancel.is_cancelled() {
                tracing::debug!(trigger_id = %trigger.id, "engine stopped, dropping remaining actions");
                break;
            }
            if let Err(err) = self.dispatcher.dispatch(action, &context).await {
                tracing::warn!(%err, trigger_id = %trigger.id, %action, "action dispatch failed");
                self.report(&trigger.id, err);
            }
        }
        Ok(true)
    }

    fn report(&self, trigger_id: &TriggerId, error: ScreenStateError) {
        // Nobody listening is fine.
        let _ = self.failures.send(TriggerFailure {
            trigger_id: trigger_id.clone(),
            error: Arc::new(error),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::time::Duration;

    use tokio::sync::{Notify, mpsc};

    use super::*;
    use crate::config::StoreConfig;
    use screenstate_domain::condition::{Binding, Condition};
    use screenstate_domain::time::Millis;
    use screenstate_domain::trigger::{Action, TriggerSource};
    use screenstate_domain::variable::{Scope, StoredVariable, WritePolicy};

    // ── Null storage ───────────────────────────────────────────────

    struct NullStorage;

    impl PersistentVariableStorage for NullStorage {
        fn load(
            &self,
            _scope: Scope,
            _screen_id: Option<&ScreenId>,
        ) -> impl Future<Output = Result<Vec<StoredVariable>, ScreenStateError>> + Send {
            async { Ok(Vec::new()) }
        }
        fn save(
            &self,
            _variable: StoredVariable,
            _screen_id: Option<&ScreenId>,
        ) -> impl Future<Output = Result<(), ScreenStateError>> + Send {
            async { Ok(()) }
        }
        fn remove(
            &self,
            _key: &str,
            _scope: Scope,
            _screen_id: Option<&ScreenId>,
        ) -> impl Future<Output = Result<(), ScreenStateError>> + Send {
            async { Ok(()) }
        }
    }

    // ── Spy dispatcher ─────────────────────────────────────────────

    struct SpyDispatcher {
        sent: mpsc::UnboundedSender<(ExecutionContext, Action)>,
    }

    impl ActionDispatcher for SpyDispatcher {
        fn dispatch(
            &self,
            action: &Action,
            context: &ExecutionContext,
        ) -> impl Future<Output = Result<(), ScreenStateError>> + Send {
            let result = if action.kind() == Some("fail") {
                Err(ScreenStateError::dispatch("dispatcher rejected action"))
            } else {
                Ok(())
            };
            let _ = self.sent.send((context.clone(), action.clone()));
            async { result }
        }
    }

    // ── Gated dispatcher ───────────────────────────────────────────

    /// Dispatcher that parks on `wait` actions until released.
    struct GatedDispatcher {
        sent: mpsc::UnboundedSender<Action>,
        release: Arc<Notify>,
    }

    impl ActionDispatcher for GatedDispatcher {
        fn dispatch(
            &self,
            action: &Action,
            _context: &ExecutionContext,
        ) -> impl Future<Output = Result<(), ScreenStateError>> + Send {
            let _ = self.sent.send(action.clone());
            let gate = (action.kind() == Some("wait")).then(|| Arc::clone(&self.release));
            async move {
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                Ok(())
            }
        }
    }

    // ── Manual clock ───────────────────────────────────────────────

    struct ManualClock(AtomicI64);

    impl ManualClock {
        fn set(&self, now: Millis) {
            self.0.store(now, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_millis(&self) -> Millis {
            self.0.load(Ordering::SeqCst)
        }
    }

    // ── Helpers ────────────────────────────────────────────────────

    type Engine = TriggerEngine<NullStorage, SpyDispatcher>;
    type Dispatched = mpsc::UnboundedReceiver<(ExecutionContext, Action)>;

    fn setup() -> (VariableStore<NullStorage>, Engine, Dispatched) {
        let store = VariableStore::builder(NullStorage)
            .config(StoreConfig::manual_sync())
            .build();
        let (sent, received) = mpsc::unbounded_channel();
        let engine = TriggerEngine::new(&store, SpyDispatcher { sent }, "home");
        (store, engine, received)
    }

    fn on_open(id: &str) -> Trigger {
        Trigger::builder()
            .id(id)
            .source(TriggerSource::ScreenEvent {
                event: ScreenEventType::OnOpen,
            })
            .action(serde_json::json!({"type": "log", "message": id}))
            .build()
            .unwrap()
    }

    fn watching(id: &str, key: &str) -> Trigger {
        Trigger::builder()
            .id(id)
            .source(TriggerSource::VariableChanged {
                key: key.to_string(),
                scope: Scope::Global,
                screen_id: None,
            })
            .action(serde_json::json!({"type": "log", "message": id}))
            .max_executions(0)
            .build()
            .unwrap()
    }

    async fn next(received: &mut Dispatched) -> (ExecutionContext, Action) {
        tokio::time::timeout(Duration::from_secs(1), received.recv())
            .await
            .expect("no action dispatched")
            .expect("dispatcher dropped")
    }

    async fn assert_quiet(received: &mut Dispatched) {
        let extra = tokio::time::timeout(Duration::from_millis(50), received.recv()).await;
        assert!(extra.is_err(), "unexpected dispatch: {extra:?}");
    }

    async fn increment(store: &VariableStore<NullStorage>, key: &str) {
        store
            .increment(key, 1.0, Scope::Global, None, WritePolicy::InMemory)
            .await
            .unwrap();
    }

    // ── Tests ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn should_fire_matching_screen_event_with_context() {
        let (_store, engine, mut received) = setup();
        engine.start(vec![on_open("welcome")]).unwrap();

        let fired = engine.on_event(ScreenEventType::OnOpen).await.unwrap();

        assert_eq!(fired, vec![TriggerId::new("welcome")]);
        let (context, action) = next(&mut received).await;
        assert_eq!(context.screen_id, ScreenId::new("home"));
        assert_eq!(context.trigger_id, TriggerId::new("welcome"));
        assert_eq!(action.kind(), Some("log"));
    }

    #[tokio::test]
    async fn should_ignore_other_screen_events() {
        let (_store, engine, mut received) = setup();
        engine.start(vec![on_open("welcome")]).unwrap();

        let fired = engine.on_event(ScreenEventType::OnDisappear).await.unwrap();

        assert!(fired.is_empty());
        assert_quiet(&mut received).await;
    }

    #[tokio::test]
    async fn should_fire_nothing_when_stopped() {
        let (_store, engine, _received) = setup();
        let fired = engine.on_event(ScreenEventType::OnOpen).await.unwrap();
        assert!(fired.is_empty());
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn should_cap_executions_until_restart() {
        let (_store, engine, _received) = setup();
        let mut trigger = on_open("banner");
        trigger.max_executions = 2;
        engine.start(vec![trigger.clone()]).unwrap();

        assert_eq!(engine.on_event(ScreenEventType::OnOpen).await.unwrap().len(), 1);
        assert_eq!(engine.on_event(ScreenEventType::OnOpen).await.unwrap().len(), 1);
        assert!(engine.on_event(ScreenEventType::OnOpen).await.unwrap().is_empty());

        engine.stop();
        engine.start(vec![trigger]).unwrap();
        assert_eq!(engine.on_event(ScreenEventType::OnOpen).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_debounce_within_window() {
        let (_store, engine, _received) = setup();
        let clock = Arc::new(ManualClock(AtomicI64::new(1_000)));
        let engine = engine.with_clock(clock.clone());
        let mut trigger = on_open("search");
        trigger.debounce_ms = Some(200);
        engine.start(vec![trigger]).unwrap();

        assert_eq!(engine.on_event(ScreenEventType::OnOpen).await.unwrap().len(), 1);
        clock.set(1_100);
        assert!(engine.on_event(ScreenEventType::OnOpen).await.unwrap().is_empty());
        clock.set(1_250);
        assert_eq!(engine.on_event(ScreenEventType::OnOpen).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_throttle_within_window() {
        let (_store, engine, _received) = setup();
        let clock = Arc::new(ManualClock(AtomicI64::new(0)));
        let engine = engine.with_clock(clock.clone());
        let mut trigger = on_open("refresh");
        trigger.throttle_ms = Some(1_000);
        engine.start(vec![trigger]).unwrap();

        assert_eq!(engine.on_event(ScreenEventType::OnOpen).await.unwrap().len(), 1);
        clock.set(999);
        assert!(engine.on_event(ScreenEventType::OnOpen).await.unwrap().is_empty());
        clock.set(1_000);
        assert_eq!(engine.on_event(ScreenEventType::OnOpen).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_skip_when_condition_fails() {
        let (store, engine, _received) = setup();
        let mut trigger = on_open("promo");
        trigger.condition = Some(Condition::truthy(Binding::new("logged_in", Scope::Global)));
        engine.start(vec![trigger]).unwrap();

        assert!(engine.on_event(ScreenEventType::OnOpen).await.unwrap().is_empty());

        store
            .set("logged_in", true.into(), Scope::Global, None, WritePolicy::InMemory, None)
            .await
            .unwrap();
        assert_eq!(engine.on_event(ScreenEventType::OnOpen).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_return_missing_variable_from_screen_event() {
        let (_store, engine, _received) = setup();
        let mut trigger = on_open("greet");
        trigger.condition = Some(Condition::truthy(
            Binding::new("user_name", Scope::Global).required(),
        ));
        engine.start(vec![trigger]).unwrap();

        let result = engine.on_event(ScreenEventType::OnOpen).await;
        assert!(matches!(result, Err(ScreenStateError::MissingVariable(_))));
    }

    #[tokio::test]
    async fn should_fire_once_per_observed_increment() {
        let (store, engine, mut received) = setup();
        engine.start(vec![watching("visits_changed", "visits")]).unwrap();

        increment(&store, "visits").await;
        next(&mut received).await;
        assert_quiet(&mut received).await;

        increment(&store, "visits").await;
        next(&mut received).await;
        assert_quiet(&mut received).await;
    }

    #[tokio::test]
    async fn should_not_fire_when_written_value_is_unchanged() {
        let (store, engine, mut received) = setup();
        store
            .set("theme", "dark".into(), Scope::Global, None, WritePolicy::InMemory, None)
            .await
            .unwrap();
        engine.start(vec![watching("theme_changed", "theme")]).unwrap();

        store
            .set("theme", "dark".into(), Scope::Global, None, WritePolicy::InMemory, None)
            .await
            .unwrap();
        assert_quiet(&mut received).await;
    }

    #[tokio::test]
    async fn should_fire_on_removal_of_watched_variable() {
        let (store, engine, mut received) = setup();
        increment(&store, "cart").await;
        engine.start(vec![watching("cart_changed", "cart")]).unwrap();

        store.remove("cart", Scope::Global, None).await.unwrap();
        let (context, _) = next(&mut received).await;
        assert_eq!(context.trigger_id, TriggerId::new("cart_changed"));
    }

    #[tokio::test]
    async fn should_fire_watchers_in_list_order() {
        let (store, engine, mut received) = setup();
        engine
            .start(vec![watching("first", "step"), watching("second", "step")])
            .unwrap();

        increment(&store, "step").await;
        assert_eq!(next(&mut received).await.0.trigger_id, TriggerId::new("first"));
        assert_eq!(next(&mut received).await.0.trigger_id, TriggerId::new("second"));
    }

    #[tokio::test]
    async fn should_broadcast_missing_variable_from_observation() {
        let (store, engine, mut received) = setup();
        let mut trigger = watching("needs_user", "visits");
        trigger.condition = Some(Condition::truthy(
            Binding::new("user_name", Scope::Global).required(),
        ));
        let mut failures = engine.subscribe_failures();
        engine.start(vec![trigger]).unwrap();

        increment(&store, "visits").await;
        let failure = tokio::time::timeout(Duration::from_secs(1), failures.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failure.trigger_id, TriggerId::new("needs_user"));
        assert!(matches!(*failure.error, ScreenStateError::MissingVariable(_)));
        assert_quiet(&mut received).await;
    }

    #[tokio::test]
    async fn should_keep_dispatching_after_failed_action() {
        let (_store, engine, mut received) = setup();
        let trigger = Trigger::builder()
            .id("chain")
            .action(serde_json::json!({"type": "fail"}))
            .action(serde_json::json!({"type": "log", "message": "after"}))
            .build()
            .unwrap();
        let mut failures = engine.subscribe_failures();
        engine.start(vec![trigger]).unwrap();

        let fired = engine.on_event(ScreenEventType::OnOpen).await.unwrap();

        assert_eq!(fired.len(), 1);
        assert_eq!(next(&mut received).await.1.kind(), Some("fail"));
        assert_eq!(next(&mut received).await.1.kind(), Some("log"));
        let failure = failures.recv().await.unwrap();
        assert!(matches!(*failure.error, ScreenStateError::Dispatch(_)));
    }

    #[tokio::test]
    async fn should_stop_observing_after_stop() {
        let (store, engine, mut received) = setup();
        engine.start(vec![watching("visits_changed", "visits")]).unwrap();
        engine.stop();
        engine.stop();

        increment(&store, "visits").await;
        assert_quiet(&mut received).await;
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn should_reject_malformed_trigger_on_start() {
        let (_store, engine, _received) = setup();
        let mut trigger = on_open("bad");
        trigger.debounce_ms = Some(-5);

        let result = engine.start(vec![trigger]);

        assert!(matches!(result, Err(ScreenStateError::Validation(_))));
        assert!(!engine.is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_never_exceed_cap_under_concurrent_events() {
        let (_store, engine, mut received) = setup();
        let mut trigger = on_open("banner");
        trigger.max_executions = 2;
        engine.start(vec![trigger]).unwrap();
        let engine = Arc::new(engine);

        let mut handles = Vec::new();
        for _ in 0..50 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine.on_event(ScreenEventType::OnOpen).await.unwrap().len()
            }));
        }
        let mut fired = 0;
        for handle in handles {
            fired += handle.await.unwrap();
        }

        assert_eq!(fired, 2);
        next(&mut received).await;
        next(&mut received).await;
        assert_quiet(&mut received).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_cap_observed_fires_under_concurrent_writes() {
        let (store, engine, mut received) = setup();
        let mut trigger = watching("hits_changed", "hits");
        trigger.max_executions = 2;
        engine.start(vec![trigger]).unwrap();

        for _ in 0..5 {
            let mut handles = Vec::new();
            for _ in 0..10 {
                let store = store.clone();
                handles.push(tokio::spawn(async move { increment(&store, "hits").await }));
            }
            for handle in handles {
                handle.await.unwrap();
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        next(&mut received).await;
        next(&mut received).await;
        assert_quiet(&mut received).await;
    }

    #[tokio::test]
    async fn should_ignore_unrelated_writes_after_rejected_nan() {
        let (store, engine, mut received) = setup();
        engine.start(vec![watching("ratio_changed", "ratio")]).unwrap();

        let result = store
            .set("ratio", f64::NAN.into(), Scope::Global, None, WritePolicy::InMemory, None)
            .await;
        assert!(matches!(result, Err(ScreenStateError::Validation(_))));
        for _ in 0..3 {
            increment(&store, "unrelated").await;
        }
        assert_quiet(&mut received).await;
    }

    #[tokio::test]
    async fn should_drop_remaining_actions_when_stopped_mid_dispatch() {
        let store = VariableStore::builder(NullStorage)
            .config(StoreConfig::manual_sync())
            .build();
        let (sent, mut received) = mpsc::unbounded_channel();
        let release = Arc::new(Notify::new());
        let dispatcher = GatedDispatcher {
            sent,
            release: Arc::clone(&release),
        };
        let engine = Arc::new(TriggerEngine::new(&store, dispatcher, "home"));
        let trigger = Trigger::builder()
            .id("slow")
            .action(serde_json::json!({"type": "wait"}))
            .action(serde_json::json!({"type": "log", "message": "after"}))
            .build()
            .unwrap();
        engine.start(vec![trigger]).unwrap();

        let firing = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.on_event(ScreenEventType::OnOpen).await })
        };
        let first = received.recv().await.unwrap();
        assert_eq!(first.kind(), Some("wait"));
        engine.stop();
        release.notify_one();

        assert_eq!(firing.await.unwrap().unwrap().len(), 1);
        assert!(received.try_recv().is_err());
    }
}
