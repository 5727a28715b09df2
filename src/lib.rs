//! Orbit: an MVI state container.
//!
//! A [`Container`] owns one piece of state and a queue of one-shot side
//! effects. Work is submitted as intents; every intent runs on the
//! container's event loop, where reductions are applied one at a time.
//!
//! ```text
//! intent ──→ event loop ──→ pipeline ──→ reduce ──→ StateStream
//!                              │
//!                              └──────→ post_side_effect ──→ SideEffectStream
//! ```

pub mod config;
pub mod container;
pub mod error;
pub mod external;
pub mod flow;
pub mod host;
pub mod idling;
pub mod logging;
pub mod mvi;
pub mod pipeline;
pub mod settings;
pub mod testing;

pub use container::{Container, ContainerBuilder, IntentContext, IntentJob, IntentOptions, LifecyclePhase};
pub use error::{IntentFailure, OrbitError};
pub use external::{ExternalStateContainer, ExternalStateStream};
pub use flow::{BufferPolicy, SideEffectChannel, SideEffectStream, StateHolder, StateStream};
pub use host::{ContainerHost, ContainerHostWithExternalState};
pub use idling::{CountingIdlingResource, IdlingResource, NoopIdlingResource};
pub use mvi::{Reducer, SideEffect, State};
pub use pipeline::{BasePlugin, Operator, Plugin, PluginRegistry, StageContext, StageOutcome};
pub use settings::{ExceptionHandler, Settings, SettingsBuilder};
