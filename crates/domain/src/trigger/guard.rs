//! Execution guard — per-trigger bookkeeping for caps, debounce and throttle.

use crate::time::Millis;

use super::Trigger;

/// Why a fire attempt was rejected before its condition was evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardVerdict {
    Admit,
    CapReached,
    Debounced,
    Throttled,
}

/// Execution history of one trigger within one engine session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionGuard {
    pub executions: u32,
    pub last_run_ms: Option<Millis>,
}

impl ExecutionGuard {
    /// Apply the cap, debounce and throttle checks, in that order.
    #[must_use]
    pub fn check(&self, trigger: &Trigger, now: Millis) -> GuardVerdict {
        if trigger.max_executions > 0 && self.executions >= trigger.max_executions {
            return GuardVerdict::CapReached;
        }
        if self.within(trigger.debounce_ms, now) {
            return GuardVerdict::Debounced;
        }
        if self.within(trigger.throttle_ms, now) {
            return GuardVerdict::Throttled;
        }
        GuardVerdict::Admit
    }

    /// Record a successful fire at `now`.
    pub fn record(&mut self, now: Millis) {
        self.executions = self.executions.saturating_add(1);
        self.last_run_ms = Some(now);
    }

    fn within(&self, window: Option<Millis>, now: Millis) -> bool {
        match (window, self.last_run_ms) {
            (Some(window), Some(last)) => now.saturating_sub(last) < window,
            _ => false,
        }
    }
}
