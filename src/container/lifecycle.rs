use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::watch;

/// Container lifecycle: `Uninitialized → Active → Cancelled` (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecyclePhase {
    Uninitialized = 0,
    Active = 1,
    Cancelled = 2,
}

pub(crate) struct Lifecycle {
    phase: AtomicU8,
    cancelled: watch::Sender<bool>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        let (cancelled, _) = watch::channel(false);
        Self {
            phase: AtomicU8::new(LifecyclePhase::Uninitialized as u8),
            cancelled,
        }
    }

    /// Move to `Active` once the event loop is running.
    pub(crate) fn activate(&self) {
        let _ = self.phase.compare_exchange(
            LifecyclePhase::Uninitialized as u8,
            LifecyclePhase::Active as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Move to `Cancelled`. Returns `true` only for the first call.
    pub(crate) fn cancel(&self) -> bool {
        let previous = self
            .phase
            .swap(LifecyclePhase::Cancelled as u8, Ordering::SeqCst);
        if previous == LifecyclePhase::Cancelled as u8 {
            return false;
        }
        self.cancelled.send_replace(true);
        true
    }

    pub(crate) fn phase(&self) -> LifecyclePhase {
        match self.phase.load(Ordering::SeqCst) {
            0 => LifecyclePhase::Uninitialized,
            1 => LifecyclePhase::Active,
            _ => LifecyclePhase::Cancelled,
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.phase() == LifecyclePhase::Cancelled
    }

    pub(crate) fn watch(&self) -> watch::Receiver<bool> {
        self.cancelled.subscribe()
    }

    /// Resolves once the lifecycle is cancelled.
    pub(crate) async fn cancelled(&self) {
        let mut rx = self.watch();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_advance_once() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.phase(), LifecyclePhase::Uninitialized);

        lifecycle.activate();
        assert_eq!(lifecycle.phase(), LifecyclePhase::Active);

        assert!(lifecycle.cancel());
        assert!(!lifecycle.cancel());
        assert!(lifecycle.is_cancelled());

        // Terminal: activation cannot revive it.
        lifecycle.activate();
        assert_eq!(lifecycle.phase(), LifecyclePhase::Cancelled);
    }

    #[tokio::test]
    async fn cancelled_resolves_for_late_waiters() {
        let lifecycle = Lifecycle::new();
        lifecycle.activate();
        lifecycle.cancel();
        lifecycle.cancelled().await;
    }
}
