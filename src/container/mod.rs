//! The container: state, side effects and the intents that change them.
//!
//! ```text
//! Container (handle, Clone)
//!   └─ Shell ── RwLock<Arc<Core>>   swapped by the test harness
//!         └─ Core
//!              ├─ StateHolder          replay-latest state
//!              ├─ SideEffectChannel    at-most-once events
//!              ├─ Pipeline             plugins + idling
//!              └─ event loop task      FIFO intent admission
//! ```
//!
//! Dropping the last handle cancels the container.

mod context;
mod event_loop;
mod inner;
mod job;
mod lifecycle;

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::RwLock;
use uuid::Uuid;

pub use context::{IntentContext, IntentOptions};
pub use job::IntentJob;
pub use lifecycle::LifecyclePhase;

use crate::container::inner::{Core, CoreParts, Mode, OnCreate};
use crate::error::{IntentFailure, OrbitError};
use crate::external::ExternalStateContainer;
use crate::flow::{SideEffectStream, StateStream, SubscriptionToken};
use crate::mvi::{SideEffect, State};
use crate::pipeline::PluginRegistry;
use crate::settings::Settings;
use crate::testing::Item;

/// Everything needed to build a fresh core.
pub(crate) struct Blueprint<S, SE> {
    pub initial_state: S,
    pub settings: Settings,
    pub registry: Arc<PluginRegistry>,
    pub on_create: Option<OnCreate<S, SE>>,
}

impl<S: Clone, SE> Clone for Blueprint<S, SE> {
    fn clone(&self) -> Self {
        Self {
            initial_state: self.initial_state.clone(),
            settings: self.settings.clone(),
            registry: Arc::clone(&self.registry),
            on_create: self.on_create.clone(),
        }
    }
}

struct Shell<S: State, SE: SideEffect> {
    core: RwLock<Arc<Core<S, SE>>>,
    blueprint: Blueprint<S, SE>,
}

impl<S: State, SE: SideEffect> Drop for Shell<S, SE> {
    fn drop(&mut self) {
        self.core.get_mut().cancel();
    }
}

/// A state/side-effect container.
///
/// Cheap to clone; all clones drive the same container.
pub struct Container<S: State, SE: SideEffect> {
    shell: Arc<Shell<S, SE>>,
}

impl<S: State, SE: SideEffect> Clone for Container<S, SE> {
    fn clone(&self) -> Self {
        Self {
            shell: Arc::clone(&self.shell),
        }
    }
}

impl<S: State, SE: SideEffect> Container<S, SE> {
    /// Build a container with default plugins and no `on_create`.
    ///
    /// Must be called inside a tokio runtime unless `settings` names an
    /// event-loop handle.
    pub fn new(initial_state: S, settings: Settings) -> Result<Self, OrbitError> {
        Self::builder(initial_state).settings(settings).build()
    }

    pub fn builder(initial_state: S) -> ContainerBuilder<S, SE> {
        ContainerBuilder {
            initial_state,
            settings: Settings::default(),
            registry: PluginRegistry::new(),
            on_create: None,
        }
    }

    fn core(&self) -> Arc<Core<S, SE>> {
        self.shell.core.read().clone()
    }

    pub fn id(&self) -> Uuid {
        self.core().id()
    }

    /// Current state snapshot.
    pub fn state(&self) -> S {
        self.core().state()
    }

    /// Replay-latest stream of state. In production the first observation
    /// triggers `on_create`.
    pub fn state_stream(&self) -> StateStream<S> {
        self.core().state_stream()
    }

    /// Stream of side effects. Each one reaches at most one subscriber.
    pub fn side_effect_stream(&self) -> SideEffectStream<SE> {
        self.core().side_effect_stream()
    }

    /// Dispatch an intent. Bodies start in dispatch order.
    pub fn orbit<F, Fut>(&self, body: F) -> Result<IntentJob, OrbitError>
    where
        F: FnOnce(IntentContext<S, SE>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.orbit_with(IntentOptions::default(), body)
    }

    pub fn orbit_with<F, Fut>(&self, options: IntentOptions, body: F) -> Result<IntentJob, OrbitError>
    where
        F: FnOnce(IntentContext<S, SE>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.core().dispatch(options, body)
    }

    /// Cancel every in-flight intent and end all streams. Idempotent.
    pub fn cancel(&self) {
        self.core().cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.core().is_cancelled()
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.core().phase()
    }

    /// Resolves once the container is cancelled.
    pub async fn cancelled(&self) {
        let core = self.core();
        core.cancelled().await
    }

    /// Wait until no intent is in flight.
    pub async fn join_intents(&self) {
        let core = self.core();
        core.join_intents().await
    }

    /// Number of intents dispatched and not yet settled.
    pub fn active_intents(&self) -> usize {
        self.core().active_intents()
    }

    pub fn settings(&self) -> Settings {
        self.core().settings().clone()
    }

    /// Open state and side-effect streams.
    pub fn subscriber_count(&self) -> usize {
        self.core().subscriptions().count()
    }

    /// Unhandled failures recorded since the last call.
    pub fn take_unhandled_failures(&self) -> Vec<IntentFailure> {
        self.core().take_unhandled()
    }

    /// View this container through a derived external state.
    pub fn with_external_state<E, F>(&self, map: F) -> ExternalStateContainer<S, E, SE>
    where
        E: State,
        F: Fn(&S) -> E + Send + Sync + 'static,
    {
        ExternalStateContainer::new(self.clone(), Arc::new(map))
    }

    pub(crate) fn blueprint(&self) -> &Blueprint<S, SE> {
        &self.shell.blueprint
    }

    /// Replace the live core with a fresh one in test mode.
    pub(crate) fn install_test_core(
        &self,
        initial_state: S,
        settings: Settings,
        tap: tokio::sync::mpsc::UnboundedSender<Item<S, SE>>,
    ) -> Result<SubscriptionToken, OrbitError> {
        let blueprint = self.blueprint().clone();
        let core = Core::start(CoreParts {
            initial_state,
            settings,
            registry: blueprint.registry,
            on_create: blueprint.on_create,
            mode: Mode::Test,
            tap: Some(tap),
        })?;
        // The session observes both streams through the tap.
        let observer = core.subscriptions().acquire();
        let previous = std::mem::replace(&mut *self.shell.core.write(), core);
        previous.cancel();
        Ok(observer)
    }

    /// Explicitly run `on_create` on a test core.
    pub(crate) fn run_on_create(&self) -> Result<IntentJob, OrbitError> {
        self.core().run_on_create()
    }
}

impl<S: State, SE: SideEffect> std::fmt::Debug for Container<S, SE> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.id())
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Container`].
pub struct ContainerBuilder<S, SE> {
    initial_state: S,
    settings: Settings,
    registry: PluginRegistry,
    on_create: Option<OnCreate<S, SE>>,
}

impl<S: State, SE: SideEffect> ContainerBuilder<S, SE> {
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Plugins wrapped around every stage, in addition to the base plugin.
    pub fn plugins(mut self, registry: PluginRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Intent run once when the container is first observed or used.
    pub fn on_create<F, Fut>(mut self, on_create: F) -> Self
    where
        F: Fn(IntentContext<S, SE>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_create = Some(Arc::new(move |ctx| on_create(ctx).boxed()));
        self
    }

    pub fn build(self) -> Result<Container<S, SE>, OrbitError> {
        let blueprint = Blueprint {
            initial_state: self.initial_state,
            settings: self.settings,
            registry: Arc::new(self.registry),
            on_create: self.on_create,
        };
        let core = Core::start(CoreParts {
            initial_state: blueprint.initial_state.clone(),
            settings: blueprint.settings.clone(),
            registry: Arc::clone(&blueprint.registry),
            on_create: blueprint.on_create.clone(),
            mode: Mode::Production,
            tap: None,
        })?;
        Ok(Container {
            shell: Arc::new(Shell {
                core: RwLock::new(core),
                blueprint,
            }),
        })
    }
}
