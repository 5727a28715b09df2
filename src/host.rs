//! Traits for types that own a container.

use std::future::Future;

use crate::container::{Container, IntentContext, IntentJob, IntentOptions};
use crate::error::OrbitError;
use crate::external::ExternalStateContainer;
use crate::mvi::{SideEffect, State};

/// A type that exposes one [`Container`] and dispatches intents on it.
///
/// ```ignore
/// struct CounterHost {
///     container: Container<u32, Toast>,
/// }
///
/// impl ContainerHost for CounterHost {
///     type State = u32;
///     type SideEffect = Toast;
///
///     fn container(&self) -> &Container<u32, Toast> {
///         &self.container
///     }
/// }
///
/// host.intent(|ctx| async move {
///     ctx.reduce(|n| n + 1).await?;
///     anyhow::Ok(())
/// })?;
/// ```
pub trait ContainerHost {
    type State: State;
    type SideEffect: SideEffect;

    fn container(&self) -> &Container<Self::State, Self::SideEffect>;

    fn intent<F, Fut>(&self, body: F) -> Result<IntentJob, OrbitError>
    where
        F: FnOnce(IntentContext<Self::State, Self::SideEffect>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.container().orbit(body)
    }

    fn intent_named<F, Fut>(&self, name: &str, body: F) -> Result<IntentJob, OrbitError>
    where
        F: FnOnce(IntentContext<Self::State, Self::SideEffect>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.container().orbit_with(IntentOptions::named(name), body)
    }
}

/// A host that publishes a projection of its internal state.
pub trait ContainerHostWithExternalState: ContainerHost {
    type ExternalState: State;

    fn external_container(
        &self,
    ) -> &ExternalStateContainer<Self::State, Self::ExternalState, Self::SideEffect>;

    fn external_state(&self) -> Self::ExternalState {
        self.external_container().external_state()
    }
}
