//! Change signal — a monotonically increasing version counter backed by a
//! tokio [`watch`] channel.
//!
//! Every store mutation bumps the counter. Observers only learn *that*
//! something changed; consecutive bumps may be coalesced into one wake-up,
//! so observers must compare state themselves.

use tokio::sync::watch;

/// Owner side of a store's change counter.
#[derive(Debug)]
pub struct ChangeSignal {
    sender: watch::Sender<u64>,
}

impl Default for ChangeSignal {
    fn default() -> Self {
        let (sender, _) = watch::channel(0);
        Self { sender }
    }
}

impl ChangeSignal {
    /// Advance the counter and wake every subscriber.
    ///
    /// Succeeds even when nobody is subscribed.
    pub fn bump(&self) {
        self.sender.send_modify(|version| *version += 1);
    }

    /// Current counter value.
    #[must_use]
    pub fn version(&self) -> u64 {
        *self.sender.borrow()
    }

    /// Receiver that wakes on bumps made *after* this call.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.sender.subscribe()
    }
}

/// Subscription to a store's signal and, when the store delegates global
/// variables to a shared store, to that store's signal as well.
#[derive(Debug)]
pub struct ChangeSubscription {
    local: watch::Receiver<u64>,
    global: Option<watch::Receiver<u64>>,
}

impl ChangeSubscription {
    pub(crate) fn new(local: watch::Receiver<u64>, global: Option<watch::Receiver<u64>>) -> Self {
        Self { local, global }
    }

    /// Wait until either signal advances.
    ///
    /// Returns `false` once a signal's owner has been dropped.
    pub async fn changed(&mut self) -> bool {
        let result = match &mut self.global {
            Some(global) => tokio::select! {
                res = self.local.changed() => res,
                res = global.changed() => res,
            },
            None => self.local.changed().await,
        };
        result.is_ok()
    }
}
