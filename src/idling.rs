//! Idling resources let UI test frameworks wait until a container is quiet.
//!
//! The pipeline increments the resource before a suspension-prone stage
//! (reduce, transform, side effect) and decrements it when the stage ends,
//! including when the stage is cancelled.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Counter observed by an external test framework.
pub trait IdlingResource: Send + Sync {
    fn increment(&self);

    fn decrement(&self);

    /// Called once when the owning container is cancelled.
    fn close(&self) {}
}

/// Default resource: does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIdlingResource;

impl IdlingResource for NoopIdlingResource {
    fn increment(&self) {}

    fn decrement(&self) {}
}

/// Resource backed by an atomic counter, with an async wait for idleness.
#[derive(Debug, Default)]
pub struct CountingIdlingResource {
    busy: AtomicUsize,
    closed: AtomicBool,
    notify: Notify,
}

impl CountingIdlingResource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stages currently in progress.
    pub fn busy(&self) -> usize {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.busy() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait until no stage is in progress.
    pub async fn wait_idle(&self) {
        loop {
            // Register interest before checking so a decrement between the
            // check and the await is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

impl IdlingResource for CountingIdlingResource {
    fn increment(&self) {
        self.busy.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        let previous = self
            .busy
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        if previous <= 1 {
            self.notify.notify_waiters();
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Holds one increment for as long as it lives.
pub(crate) struct IdlingGuard {
    resource: Arc<dyn IdlingResource>,
}

impl IdlingGuard {
    pub(crate) fn new(resource: Arc<dyn IdlingResource>) -> Self {
        resource.increment();
        Self { resource }
    }
}

impl Drop for IdlingGuard {
    fn drop(&mut self) {
        self.resource.decrement();
    }
}
