//! Action dispatcher port — executes actions emitted by fired triggers.

use std::future::Future;

use screenstate_domain::error::ScreenStateError;
use screenstate_domain::id::{ScreenId, TriggerId};
use screenstate_domain::trigger::Action;

/// Where a dispatched action came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Screen the firing engine was started for.
    pub screen_id: ScreenId,
    /// Trigger that fired.
    pub trigger_id: TriggerId,
}

/// Executes actions against the host application (navigation, state
/// mutation, analytics, …).
///
/// The engine awaits each dispatch before handing over the next action of
/// the same trigger. Dispatchers that start long-running work should spawn
/// it and return.
pub trait ActionDispatcher: Send + Sync {
    fn dispatch(
        &self,
        action: &Action,
        context: &ExecutionContext,
    ) -> impl Future<Output = Result<(), ScreenStateError>> + Send;
}

impl<T: ActionDispatcher> ActionDispatcher for std::sync::Arc<T> {
    fn dispatch(
        &self,
        action: &Action,
        context: &ExecutionContext,
    ) -> impl Future<Output = Result<(), ScreenStateError>> + Send {
        (**self).dispatch(action, context)
    }
}
