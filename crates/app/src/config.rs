//! Variable store configuration.

use std::time::Duration;

use serde::Deserialize;

use screenstate_domain::variable::ConflictStrategy;

/// Tuning knobs for a [`VariableStore`](crate::variable_store::VariableStore).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Run the background reconciliation loop.
    pub sync_enabled: bool,
    /// Interval between reconciliation rounds, in seconds.
    pub sync_interval_secs: u64,
    /// Maximum approximate size of a single value, in characters.
    pub max_value_size: usize,
    /// How persisted copies are merged into memory.
    pub conflict_strategy: ConflictStrategy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sync_enabled: true,
            sync_interval_secs: 60,
            max_value_size: 16_384,
            conflict_strategy: ConflictStrategy::LastWriteWins,
        }
    }
}

impl StoreConfig {
    /// Configuration without the background loop, for hosts that sync by hand.
    #[must_use]
    pub fn manual_sync() -> Self {
        Self {
            sync_enabled: false,
            ..Self::default()
        }
    }

    /// Interval between reconciliation rounds, never shorter than one second.
    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }
}
