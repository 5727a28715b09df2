//! Error types for container operations and intent outcomes.

use std::any::Any;
use std::fmt::{Debug, Display};
use std::sync::Arc;

use thiserror::Error;

use crate::pipeline::Operator;

/// Misuse of the container API.
///
/// These indicate a bug in host code and are always returned to the caller,
/// never routed to the exception handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrbitError {
    /// The container was cancelled; no further intents may run.
    #[error("Container has been cancelled; no further intents can run")]
    ContainerCancelled,

    /// `run_on_create` was called twice, or after an intent was invoked.
    #[error("run_on_create should only be invoked once and before any intent")]
    OnCreateAlreadyInvoked,

    /// An operator was used but no registered plugin owns it.
    #[error("No registered plugin handles operator '{operator}'")]
    PluginMissing { operator: Operator },

    /// The event loop task is gone (its runtime shut down).
    #[error("Container event loop has stopped")]
    EventLoopStopped,

    /// Construction was attempted outside of a Tokio runtime and no
    /// runtime handle was configured.
    #[error("No Tokio runtime available to host the container event loop")]
    NoRuntime,
}

/// Why a joined intent did not complete normally.
#[derive(Debug, Clone, Error)]
pub enum IntentFailure {
    /// The intent (or its container) was cancelled.
    #[error("Intent was cancelled")]
    Cancelled,

    /// The intent body returned an error.
    #[error("Intent failed: {0}")]
    Failed(Arc<anyhow::Error>),

    /// The intent body panicked.
    #[error("Intent panicked: {0}")]
    Panicked(String),
}

impl IntentFailure {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, IntentFailure::Cancelled)
    }

    /// The error returned by the intent body, if it failed with one.
    pub fn error(&self) -> Option<&anyhow::Error> {
        match self {
            IntentFailure::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Downcast the body's error to a concrete type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: Display + Debug + Send + Sync + 'static,
    {
        self.error().and_then(|err| err.downcast_ref::<E>())
    }

    /// Classify an error returned by an intent body.
    ///
    /// A body that bailed out because its container was cancelled is a
    /// cancellation, not an application error.
    pub(crate) fn from_body_error(err: anyhow::Error) -> Self {
        match err.downcast_ref::<OrbitError>() {
            Some(OrbitError::ContainerCancelled) => IntentFailure::Cancelled,
            _ => IntentFailure::Failed(Arc::new(err)),
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        IntentFailure::Panicked(panic_message(payload.as_ref()))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
