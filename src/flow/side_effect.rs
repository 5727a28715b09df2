//! Buffered single-consumer side-effect queue.
//!
//! All subscribers pull from one queue. An item taken by one subscriber is
//! gone for everyone, so attaching two observers never duplicates an event
//! (e.g. navigating twice during a configuration change).

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::flow::subscription::SubscriptionToken;
use crate::mvi::SideEffect;

/// How many undelivered side effects the channel keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferPolicy {
    /// Keep everything until a subscriber takes it.
    #[default]
    Unbounded,
    /// Keep at most this many; posting to a full buffer drops the oldest.
    DropOldest(usize),
}

impl BufferPolicy {
    /// Bounded policy; a capacity of zero is raised to one.
    pub fn drop_oldest(capacity: usize) -> Self {
        BufferPolicy::DropOldest(capacity.max(1))
    }
}

/// Producer side of the side-effect queue. Cheap to clone.
pub struct SideEffectChannel<SE> {
    shared: Arc<Shared<SE>>,
}

struct Shared<SE> {
    queue: Mutex<Queue<SE>>,
    notify: Notify,
}

struct Queue<SE> {
    items: VecDeque<SE>,
    policy: BufferPolicy,
    closed: bool,
    dropped: u64,
}

impl<SE> Clone for SideEffectChannel<SE> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<SE: SideEffect> Default for SideEffectChannel<SE> {
    fn default() -> Self {
        Self::new(BufferPolicy::default())
    }
}

impl<SE: SideEffect> SideEffectChannel<SE> {
    pub fn new(policy: BufferPolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    items: VecDeque::new(),
                    policy,
                    closed: false,
                    dropped: 0,
                }),
                notify: Notify::new(),
            }),
        }
    }

    /// Enqueue one side effect. Returns `false` if the channel is closed.
    pub fn post(&self, side_effect: SE) -> bool {
        {
            let mut queue = self.shared.queue.lock();
            if queue.closed {
                return false;
            }
            if let BufferPolicy::DropOldest(capacity) = queue.policy {
                while queue.items.len() >= capacity.max(1) {
                    queue.items.pop_front();
                    queue.dropped += 1;
                    tracing::warn!(
                        capacity = capacity,
                        dropped_total = queue.dropped,
                        "Side effect buffer full, dropped oldest pending side effect"
                    );
                }
            }
            queue.items.push_back(side_effect);
        }
        self.shared.notify.notify_one();
        true
    }

    /// Attach a consumer. It drains the pending buffer, then receives live
    /// posts, competing with any other attached consumer.
    pub fn subscribe(&self) -> SideEffectStream<SE> {
        SideEffectStream {
            shared: Arc::clone(&self.shared),
            pending: None,
            _token: None,
        }
    }

    /// Number of side effects waiting for a consumer.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().items.len()
    }

    /// Number of side effects discarded by a bounded policy.
    pub fn dropped(&self) -> u64 {
        self.shared.queue.lock().dropped
    }

    /// Stop accepting posts. Consumers drain what is left, then end.
    pub fn close(&self) {
        self.shared.queue.lock().closed = true;
        self.shared.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.queue.lock().closed
    }
}

async fn take<SE>(shared: Arc<Shared<SE>>) -> Option<SE> {
    loop {
        // Register before checking the queue so a post between the check and
        // the await still wakes us.
        let notified = shared.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        {
            let mut queue = shared.queue.lock();
            if let Some(item) = queue.items.pop_front() {
                return Some(item);
            }
            if queue.closed {
                return None;
            }
        }
        notified.await;
    }
}

type Take<SE> = Pin<Box<dyn Future<Output = Option<SE>> + Send>>;

/// One subscriber session on a [`SideEffectChannel`].
pub struct SideEffectStream<SE> {
    shared: Arc<Shared<SE>>,
    pending: Option<Take<SE>>,
    _token: Option<SubscriptionToken>,
}

impl<SE: SideEffect> SideEffectStream<SE> {
    pub(crate) fn with_token(mut self, token: SubscriptionToken) -> Self {
        self._token = Some(token);
        self
    }

    /// Wait for the next side effect; `None` once the channel is closed
    /// and drained.
    pub async fn next(&mut self) -> Option<SE> {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    /// Take a side effect if one is already queued.
    pub fn try_next(&mut self) -> Option<SE> {
        self.shared.queue.lock().items.pop_front()
    }
}

impl<SE: SideEffect> Stream for SideEffectStream<SE> {
    type Item = SE;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<SE>> {
        let this = self.get_mut();
        let shared = Arc::clone(&this.shared);
        let pending = this.pending.get_or_insert_with(|| Box::pin(take(shared)));
        match pending.as_mut().poll(cx) {
            Poll::Ready(item) => {
                this.pending = None;
                Poll::Ready(item)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
