use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::flow::BufferPolicy;
use crate::settings::{SettingsBuilder, DEFAULT_REPEAT_ON_SUBSCRIPTION_STOP_TIMEOUT};

/// Declarative subset of [`Settings`](crate::Settings) that can live in a
/// TOML file.
///
/// ```toml
/// side_effect_buffer = { drop_oldest = 64 }
/// repeat_on_subscription_stop_timeout_ms = 250
/// register_idling = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsFile {
    /// Buffering of undelivered side effects (default: unbounded).
    pub side_effect_buffer: BufferPolicy,
    /// Grace period before `repeat_on_subscription` blocks stop (default: 100).
    pub repeat_on_subscription_stop_timeout_ms: u64,
    /// Whether intents register with the idling resource (default: true).
    pub register_idling: bool,
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            side_effect_buffer: BufferPolicy::Unbounded,
            repeat_on_subscription_stop_timeout_ms: default_stop_timeout_ms(),
            register_idling: true,
        }
    }
}

fn default_stop_timeout_ms() -> u64 {
    DEFAULT_REPEAT_ON_SUBSCRIPTION_STOP_TIMEOUT.as_millis() as u64
}

impl SettingsFile {
    /// Copy these values onto a builder, leaving runtime-only options
    /// (handlers, runtimes, idling resource) untouched.
    pub fn apply(&self, builder: SettingsBuilder) -> SettingsBuilder {
        builder
            .side_effect_buffer(self.side_effect_buffer)
            .repeat_on_subscription_stop_timeout(Duration::from_millis(
                self.repeat_on_subscription_stop_timeout_ms,
            ))
            .register_idling(self.register_idling)
    }
}
