//! Test sessions that assert on a host's projected state.

use std::fmt::Debug;

use super::{Item, TestContainerHost, TestError, TestOptions, TestSession};
use crate::error::OrbitError;
use crate::host::ContainerHostWithExternalState;

/// Entry point for testing a [`ContainerHostWithExternalState`] through its
/// external state.
pub trait TestContainerHostWithExternalState: ContainerHostWithExternalState + Sized {
    fn test_external(
        &self,
        options: TestOptions<Self::State>,
    ) -> Result<ExternalTestSession<'_, Self>, OrbitError> {
        Ok(ExternalTestSession {
            inner: self.test(options)?,
            last: None,
        })
    }
}

impl<H: ContainerHostWithExternalState> TestContainerHostWithExternalState for H {}

/// A [`TestSession`] that sees captured states through the host's projection.
///
/// Consecutive states with an equal projection count as one, the same way
/// [`ExternalStateStream`](crate::ExternalStateStream) skips them.
pub struct ExternalTestSession<'h, H: ContainerHostWithExternalState> {
    inner: TestSession<'h, H>,
    last: Option<H::ExternalState>,
}

impl<'h, H> ExternalTestSession<'h, H>
where
    H: ContainerHostWithExternalState,
    H::State: Debug,
    H::SideEffect: Debug,
    H::ExternalState: Debug,
{
    /// The underlying session, for run_on_create, side effects and waits.
    pub fn session(&mut self) -> &mut TestSession<'h, H> {
        &mut self.inner
    }

    pub async fn expect_initial_external_state(&mut self) -> Result<(), TestError> {
        let expected = self
            .inner
            .host
            .external_container()
            .project(&self.inner.initial_state);
        self.expect_external_state_eq(expected).await
    }

    /// Expect the next distinct projection to be `change(&last_projection)`.
    pub async fn expect_external_state<F>(&mut self, change: F) -> Result<(), TestError>
    where
        F: FnOnce(&H::ExternalState) -> H::ExternalState,
    {
        let current = match &self.last {
            Some(last) => last.clone(),
            None => self
                .inner
                .host
                .external_container()
                .project(&self.inner.last_state),
        };
        self.expect_external_state_eq(change(&current)).await
    }

    pub async fn expect_external_state_eq(
        &mut self,
        expected: H::ExternalState,
    ) -> Result<(), TestError> {
        let actual = self.next_external_state().await?;
        if actual != expected {
            return Err(TestError::Mismatch {
                expected: format!("ExternalState({expected:?})"),
                actual: format!("ExternalState({actual:?})"),
            });
        }
        Ok(())
    }

    async fn next_external_state(&mut self) -> Result<H::ExternalState, TestError> {
        loop {
            let state = match self.inner.next_item("ExternalState").await? {
                Item::State(state) => state,
                other => {
                    return Err(TestError::UnexpectedItem {
                        expected: "ExternalState",
                        actual: format!("{other:?}"),
                    })
                }
            };
            let projected = self.inner.host.external_container().project(&state);
            if self.last.as_ref() == Some(&projected) {
                continue;
            }
            self.last = Some(projected.clone());
            return Ok(projected);
        }
    }

    pub async fn expect_side_effect(&mut self, expected: H::SideEffect) -> Result<(), TestError>
    where
        H::SideEffect: PartialEq,
    {
        self.inner.expect_side_effect(expected).await
    }

    /// Fails if another distinct projection or a side effect is pending.
    /// States that project to the last seen value are skipped.
    pub async fn expect_no_external_changes(&mut self) -> Result<(), TestError> {
        self.inner.join_intents().await?;
        let mut leftover = Vec::new();
        while let Ok(item) = self.inner.items.try_recv() {
            if let Item::State(state) = &item {
                self.inner.last_state = state.clone();
                let projected = self.inner.host.external_container().project(state);
                if self.last.as_ref() == Some(&projected) {
                    continue;
                }
                self.last = Some(projected);
            }
            leftover.push(format!("{item:?}"));
        }
        if !leftover.is_empty() {
            return Err(TestError::UnconsumedItems(leftover));
        }
        Ok(())
    }

    /// Like [`TestSession::finish`], ignoring states whose projection did
    /// not change.
    pub async fn finish(mut self) -> Result<(), TestError> {
        self.expect_no_external_changes().await?;
        self.inner.finish().await
    }

    pub fn cancel_and_ignore_remaining_items(self) {
        self.inner.cancel_and_ignore_remaining_items();
    }
}
