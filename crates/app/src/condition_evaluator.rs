//! Condition evaluator — resolves a [`Condition`]'s binding against a
//! variable store and computes its outcome.

use screenstate_domain::condition::Condition;
use screenstate_domain::error::MissingVariableError;
use screenstate_domain::id::ScreenId;

use crate::variable_store::VariableStore;

/// Evaluates conditions for one screen.
///
/// Evaluation only reads memory, so it never suspends and can run under the
/// trigger engine's guard lock.
pub struct ConditionEvaluator<S> {
    store: VariableStore<S>,
    screen_id: ScreenId,
}

impl<S> ConditionEvaluator<S> {
    /// Create an evaluator resolving `Screen` bindings against `screen_id`.
    pub fn new(store: &VariableStore<S>, screen_id: impl Into<ScreenId>) -> Self {
        Self {
            store: store.clone(),
            screen_id: screen_id.into(),
        }
    }

    /// Evaluate a condition. A missing condition holds.
    ///
    /// # Errors
    ///
    /// Returns [`MissingVariableError`] if the bound variable is absent and the
    /// binding requires it.
    pub fn evaluate(&self, condition: Option<&Condition>) -> Result<bool, MissingVariableError> {
        let Some(condition) = condition else {
            return Ok(true);
        };
        let binding = &condition.binding;
        let found = self
            .store
            .peek(&binding.key, binding.scope, Some(&self.screen_id));
        let resolved = binding.resolve(found)?;
        Ok(condition.outcome(resolved.as_ref()))
    }
}
