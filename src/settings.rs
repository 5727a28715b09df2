//! Immutable container configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::error::IntentFailure;
use crate::flow::BufferPolicy;
use crate::idling::{IdlingResource, NoopIdlingResource};

/// Receives intent failures instead of letting them cancel the container.
pub type ExceptionHandler = Arc<dyn Fn(&IntentFailure) + Send + Sync>;

/// Default grace period before `repeat_on_subscription` blocks stop.
pub const DEFAULT_REPEAT_ON_SUBSCRIPTION_STOP_TIMEOUT: Duration = Duration::from_millis(100);

/// Configuration resolved once when a container is built.
#[derive(Clone)]
pub struct Settings {
    exception_handler: Option<ExceptionHandler>,
    event_loop: Option<Handle>,
    intent_launching: Option<Handle>,
    repeat_on_subscription_stop_timeout: Duration,
    idling_resource: Arc<dyn IdlingResource>,
    side_effect_buffer: BufferPolicy,
    register_idling: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            exception_handler: None,
            event_loop: None,
            intent_launching: None,
            repeat_on_subscription_stop_timeout: DEFAULT_REPEAT_ON_SUBSCRIPTION_STOP_TIMEOUT,
            idling_resource: Arc::new(NoopIdlingResource),
            side_effect_buffer: BufferPolicy::Unbounded,
            register_idling: true,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("exception_handler", &self.exception_handler.is_some())
            .field("event_loop", &self.event_loop.is_some())
            .field("intent_launching", &self.intent_launching.is_some())
            .field(
                "repeat_on_subscription_stop_timeout",
                &self.repeat_on_subscription_stop_timeout,
            )
            .field("side_effect_buffer", &self.side_effect_buffer)
            .field("register_idling", &self.register_idling)
            .finish()
    }
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Rebuild from these settings.
    pub fn to_builder(&self) -> SettingsBuilder {
        SettingsBuilder {
            settings: self.clone(),
        }
    }

    pub fn exception_handler(&self) -> Option<&ExceptionHandler> {
        self.exception_handler.as_ref()
    }

    /// Runtime hosting the event loop. `None` means the runtime current at
    /// construction.
    pub fn event_loop(&self) -> Option<&Handle> {
        self.event_loop.as_ref()
    }

    /// Runtime that `transform` stages are spawned onto. `None` means the
    /// runtime current when the stage runs.
    pub fn intent_launching(&self) -> Option<&Handle> {
        self.intent_launching.as_ref()
    }

    pub fn repeat_on_subscription_stop_timeout(&self) -> Duration {
        self.repeat_on_subscription_stop_timeout
    }

    pub fn idling_resource(&self) -> &Arc<dyn IdlingResource> {
        &self.idling_resource
    }

    pub fn side_effect_buffer(&self) -> BufferPolicy {
        self.side_effect_buffer
    }

    /// Whether intents register with the idling resource unless they opt out.
    pub fn register_idling(&self) -> bool {
        self.register_idling
    }
}

/// Builder for [`Settings`].
#[derive(Debug, Default, Clone)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    pub fn exception_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&IntentFailure) + Send + Sync + 'static,
    {
        self.settings.exception_handler = Some(Arc::new(handler));
        self
    }

    pub fn without_exception_handler(mut self) -> Self {
        self.settings.exception_handler = None;
        self
    }

    pub fn event_loop(mut self, handle: Handle) -> Self {
        self.settings.event_loop = Some(handle);
        self
    }

    pub fn intent_launching(mut self, handle: Handle) -> Self {
        self.settings.intent_launching = Some(handle);
        self
    }

    pub fn repeat_on_subscription_stop_timeout(mut self, timeout: Duration) -> Self {
        self.settings.repeat_on_subscription_stop_timeout = timeout;
        self
    }

    pub fn idling_resource(mut self, resource: Arc<dyn IdlingResource>) -> Self {
        self.settings.idling_resource = resource;
        self
    }

    pub fn side_effect_buffer(mut self, policy: BufferPolicy) -> Self {
        self.settings.side_effect_buffer = policy;
        self
    }

    pub fn register_idling(mut self, register: bool) -> Self {
        self.settings.register_idling = register;
        self
    }

    pub fn build(self) -> Settings {
        self.settings
    }
}
