//! Test harness for container hosts.
//!
//! [`TestContainerHost::test`] swaps the host's container for a test core:
//!
//! - every state commit and side effect lands in one ordered item queue,
//! - the event loop and transforms run on the calling runtime,
//! - `on_create` runs only through [`TestSession::run_on_create`],
//! - the session counts as a subscriber, so `repeat_on_subscription`
//!   blocks run while it is open.
//!
//! The initial state is always the first item.
//!
//! Hosts with an external state can be tested through their projection with
//! [`TestContainerHostWithExternalState::test_external`].

mod error;
mod external;
mod item;
mod timeout;

use std::fmt::Debug;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;

pub use error::TestError;
pub use external::{ExternalTestSession, TestContainerHostWithExternalState};
pub use item::Item;

use crate::container::{Container, IntentJob};
use crate::error::OrbitError;
use crate::flow::SubscriptionToken;
use crate::host::ContainerHost;
use crate::settings::Settings;

/// Default wall-clock limit for each wait.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// How a test session is set up.
#[derive(Debug, Clone)]
pub struct TestOptions<S> {
    initial_state: Option<S>,
    timeout: Duration,
    settings: Option<Settings>,
}

impl<S> Default for TestOptions<S> {
    fn default() -> Self {
        Self {
            initial_state: None,
            timeout: DEFAULT_TEST_TIMEOUT,
            settings: None,
        }
    }
}

impl<S> TestOptions<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from this state instead of the container's initial state.
    pub fn initial_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the container's settings. Runtime handles are still pinned
    /// to the test runtime.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }
}

/// Entry point for testing any [`ContainerHost`].
pub trait TestContainerHost: ContainerHost + Sized {
    /// Put the host's container into test mode.
    ///
    /// Must be called from inside the test's Tokio runtime.
    fn test(&self, options: TestOptions<Self::State>) -> Result<TestSession<'_, Self>, OrbitError> {
        let runtime = Handle::try_current().map_err(|_| OrbitError::NoRuntime)?;
        let container = self.container().clone();
        let blueprint = container.blueprint();

        let initial_state = options
            .initial_state
            .unwrap_or_else(|| blueprint.initial_state.clone());
        let settings = options
            .settings
            .unwrap_or_else(|| blueprint.settings.clone())
            .to_builder()
            .event_loop(runtime.clone())
            .intent_launching(runtime)
            .build();

        let (tap, items) = mpsc::unbounded_channel();
        // Receiver is alive, so the send cannot fail.
        let _ = tap.send(Item::State(initial_state.clone()));
        let observer = container.install_test_core(initial_state.clone(), settings, tap)?;
        tracing::debug!(container = %container.id(), "Test session started");

        Ok(TestSession {
            host: self,
            container,
            items,
            initial_state: initial_state.clone(),
            last_state: initial_state,
            timeout: options.timeout,
            observer: Some(observer),
            finished: false,
        })
    }
}

impl<H: ContainerHost> TestContainerHost for H {}

/// A running test over one host.
///
/// Items must be consumed in emission order. Dropping an unfinished
/// session cancels the test core.
pub struct TestSession<'h, H: ContainerHost> {
    host: &'h H,
    container: Container<H::State, H::SideEffect>,
    items: mpsc::UnboundedReceiver<Item<H::State, H::SideEffect>>,
    initial_state: H::State,
    last_state: H::State,
    timeout: Duration,
    /// Counts the session as a subscriber of the test core.
    observer: Option<SubscriptionToken>,
    finished: bool,
}

impl<'h, H> TestSession<'h, H>
where
    H: ContainerHost,
    H::State: Debug,
    H::SideEffect: Debug,
{
    pub fn host(&self) -> &'h H {
        self.host
    }

    /// Run the host's `on_create`. Fails after any intent or a previous call.
    pub fn run_on_create(&mut self) -> Result<IntentJob, TestError> {
        Ok(self.container.run_on_create()?)
    }

    /// Next captured item, whatever its kind.
    pub async fn await_item(&mut self) -> Result<Item<H::State, H::SideEffect>, TestError> {
        self.next_item("an item").await
    }

    async fn next_item(
        &mut self,
        waiting_for: &'static str,
    ) -> Result<Item<H::State, H::SideEffect>, TestError> {
        let received = timeout::within(self.timeout, self.items.recv())
            .await
            .ok_or(TestError::Timeout {
                waiting_for,
                timeout: self.timeout,
            })?;
        let item = received.ok_or(TestError::Closed { waiting_for })?;
        if let Item::State(state) = &item {
            self.last_state = state.clone();
        }
        Ok(item)
    }

    async fn next_state(&mut self) -> Result<H::State, TestError> {
        match self.next_item("State").await? {
            Item::State(state) => Ok(state),
            other => Err(TestError::UnexpectedItem {
                expected: "State",
                actual: format!("{other:?}"),
            }),
        }
    }

    pub async fn expect_initial_state(&mut self) -> Result<(), TestError> {
        let expected = self.initial_state.clone();
        self.expect_state_eq(expected).await
    }

    /// Expect the next item to be `change(&last_state)`.
    pub async fn expect_state<F>(&mut self, change: F) -> Result<(), TestError>
    where
        F: FnOnce(&H::State) -> H::State,
    {
        let expected = change(&self.last_state);
        self.expect_state_eq(expected).await
    }

    pub async fn expect_state_eq(&mut self, expected: H::State) -> Result<(), TestError> {
        let actual = self.next_state().await?;
        if actual != expected {
            return Err(TestError::Mismatch {
                expected: format!("State({expected:?})"),
                actual: format!("State({actual:?})"),
            });
        }
        Ok(())
    }

    pub async fn expect_side_effect(&mut self, expected: H::SideEffect) -> Result<(), TestError>
    where
        H::SideEffect: PartialEq,
    {
        let actual = match self.next_item("SideEffect").await? {
            Item::SideEffect(side_effect) => side_effect,
            other => {
                return Err(TestError::UnexpectedItem {
                    expected: "SideEffect",
                    actual: format!("{other:?}"),
                })
            }
        };
        if actual != expected {
            return Err(TestError::Mismatch {
                expected: format!("SideEffect({expected:?})"),
                actual: format!("SideEffect({actual:?})"),
            });
        }
        Ok(())
    }

    pub async fn skip_items(&mut self, count: usize) -> Result<(), TestError> {
        for _ in 0..count {
            self.next_item("an item to skip").await?;
        }
        Ok(())
    }

    /// Wait for in-flight intents, then fail if anything was emitted.
    pub async fn expect_no_items(&mut self) -> Result<(), TestError> {
        self.join_intents().await?;
        let leftover = self.drain();
        if !leftover.is_empty() {
            return Err(TestError::UnconsumedItems(leftover));
        }
        Ok(())
    }

    /// Wait until no intent is in flight.
    pub async fn join_intents(&mut self) -> Result<(), TestError> {
        timeout::within(self.timeout, self.container.join_intents())
            .await
            .ok_or(TestError::Timeout {
                waiting_for: "intents to finish",
                timeout: self.timeout,
            })
    }

    /// End the session. Fails on unhandled intent failures or unconsumed items.
    pub async fn finish(mut self) -> Result<(), TestError> {
        self.join_intents().await?;
        self.finished = true;

        let failures = self.container.take_unhandled_failures();
        let leftover = self.drain();
        self.observer.take();
        self.container.cancel();

        if !failures.is_empty() {
            return Err(TestError::UnhandledFailures(failures));
        }
        if !leftover.is_empty() {
            return Err(TestError::UnconsumedItems(leftover));
        }
        tracing::debug!(container = %self.container.id(), "Test session finished");
        Ok(())
    }

    /// End the session without checking what is left.
    pub fn cancel_and_ignore_remaining_items(mut self) {
        self.finished = true;
        self.observer.take();
        self.container.cancel();
    }

    fn drain(&mut self) -> Vec<String> {
        let mut leftover = Vec::new();
        while let Ok(item) = self.items.try_recv() {
            leftover.push(format!("{item:?}"));
        }
        leftover
    }
}

impl<H: ContainerHost> Drop for TestSession<'_, H> {
    fn drop(&mut self) {
        self.observer.take();
        if !self.finished {
            self.container.cancel();
        }
    }
}
