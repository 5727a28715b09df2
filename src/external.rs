//! A container seen through a projection of its state.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;

use crate::container::Container;
use crate::flow::{SideEffectStream, StateStream};
use crate::mvi::{SideEffect, State};

type Projection<S, E> = Arc<dyn Fn(&S) -> E + Send + Sync>;

/// Wraps a [`Container`] and exposes `map(state)` as its external state.
///
/// Intents still operate on the internal state.
pub struct ExternalStateContainer<S: State, E, SE: SideEffect> {
    container: Container<S, SE>,
    map: Projection<S, E>,
}

impl<S: State, E, SE: SideEffect> Clone for ExternalStateContainer<S, E, SE> {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
            map: Arc::clone(&self.map),
        }
    }
}

impl<S: State, E: State, SE: SideEffect> ExternalStateContainer<S, E, SE> {
    pub(crate) fn new(container: Container<S, SE>, map: Projection<S, E>) -> Self {
        Self { container, map }
    }

    /// The wrapped container.
    pub fn container(&self) -> &Container<S, SE> {
        &self.container
    }

    pub fn external_state(&self) -> E {
        self.project(&self.container.state())
    }

    pub(crate) fn project(&self, state: &S) -> E {
        (self.map)(state)
    }

    /// Projected state stream. Consecutive equal projections are skipped.
    pub fn external_state_stream(&self) -> ExternalStateStream<S, E> {
        ExternalStateStream {
            inner: self.container.state_stream(),
            map: Arc::clone(&self.map),
            last: None,
        }
    }

    pub fn side_effect_stream(&self) -> SideEffectStream<SE> {
        self.container.side_effect_stream()
    }
}

/// Stream returned by [`ExternalStateContainer::external_state_stream`].
pub struct ExternalStateStream<S, E> {
    inner: StateStream<S>,
    map: Projection<S, E>,
    last: Option<E>,
}

impl<S: State, E: State> ExternalStateStream<S, E> {
    pub async fn next(&mut self) -> Option<E> {
        futures::StreamExt::next(self).await
    }
}

impl<S: State, E: State> Unpin for ExternalStateStream<S, E> {}

impl<S: State, E: State> Stream for ExternalStateStream<S, E> {
    type Item = E;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<E>> {
        let this = self.get_mut();
        loop {
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(state)) => {
                    let projected = (this.map)(&state);
                    if this.last.as_ref() == Some(&projected) {
                        continue;
                    }
                    this.last = Some(projected.clone());
                    return Poll::Ready(Some(projected));
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
