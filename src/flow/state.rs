//! Replay-latest state holder.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::flow::subscription::SubscriptionToken;
use crate::mvi::State;

/// Holds the current state and fans every commit out to subscribers.
///
/// Each subscriber owns an unbounded queue, so a slow observer never misses
/// a commit. Commits equal to the current value are not emitted.
pub struct StateHolder<S> {
    inner: Mutex<Inner<S>>,
}

struct Inner<S> {
    current: S,
    subscribers: Vec<mpsc::UnboundedSender<S>>,
    closed: bool,
}

impl<S: State> StateHolder<S> {
    pub fn new(initial: S) -> Self {
        Self {
            inner: Mutex::new(Inner {
                current: initial,
                subscribers: Vec::new(),
                closed: false,
            }),
        }
    }

    /// The latest committed value.
    pub fn current(&self) -> S {
        self.inner.lock().current.clone()
    }

    /// Subscribe: the stream yields the current value first, then every
    /// later commit in order.
    pub fn subscribe(&self) -> StateStream<S> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        // Receiver is alive, so the send cannot fail.
        let _ = tx.send(inner.current.clone());
        if !inner.closed {
            inner.subscribers.push(tx);
        }
        StateStream {
            receiver: rx,
            _token: None,
        }
    }

    /// Apply `reducer` atomically relative to every other update.
    ///
    /// Returns the committed value, or `None` if the reducer produced a
    /// value equal to the current one.
    pub fn update<F>(&self, reducer: F) -> Option<S>
    where
        F: FnOnce(&S) -> S,
    {
        let mut inner = self.inner.lock();
        let next = reducer(&inner.current);
        if next == inner.current {
            return None;
        }
        inner.current = next.clone();
        inner
            .subscribers
            .retain(|subscriber| subscriber.send(next.clone()).is_ok());
        Some(next)
    }

    /// Replace the current value.
    pub fn set(&self, value: S) -> Option<S> {
        self.update(move |_| value)
    }

    /// Number of streams still attached.
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|subscriber| !subscriber.is_closed());
        inner.subscribers.len()
    }

    /// End all streams. The value stays readable.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

/// Stream of committed states: the value current at subscription, then
/// every commit in order. Ends when the holder is closed.
pub struct StateStream<S> {
    receiver: mpsc::UnboundedReceiver<S>,
    _token: Option<SubscriptionToken>,
}

impl<S> StateStream<S> {
    pub(crate) fn with_token(mut self, token: SubscriptionToken) -> Self {
        self._token = Some(token);
        self
    }

    /// Wait for the next state; `None` once the holder is closed and the
    /// backlog is drained.
    pub async fn next(&mut self) -> Option<S> {
        self.receiver.recv().await
    }

    /// Take the next state if one is already queued.
    pub fn try_next(&mut self) -> Option<S> {
        self.receiver.try_recv().ok()
    }
}

impl<S> Stream for StateStream<S> {
    type Item = S;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}
