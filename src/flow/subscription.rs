//! Reference counting of attached observers.

use std::sync::Arc;

use tokio::sync::watch;

/// Counts live subscriptions and lets tasks wait for the count to change.
#[derive(Debug)]
pub struct SubscriptionTracker {
    count: Arc<watch::Sender<usize>>,
}

impl Default for SubscriptionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionTracker {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            count: Arc::new(count),
        }
    }

    /// Register one subscriber. The count drops again when the token drops.
    pub fn acquire(&self) -> SubscriptionToken {
        self.count.send_modify(|n| *n += 1);
        SubscriptionToken {
            count: Arc::clone(&self.count),
        }
    }

    pub fn count(&self) -> usize {
        *self.count.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<usize> {
        self.count.subscribe()
    }
}

/// Keeps a subscriber counted while alive.
#[derive(Debug)]
pub struct SubscriptionToken {
    count: Arc<watch::Sender<usize>>,
}

impl Drop for SubscriptionToken {
    fn drop(&mut self) {
        self.count.send_modify(|n| *n = n.saturating_sub(1));
    }
}
