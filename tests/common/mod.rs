//! Shared test hosts and helpers.

#![allow(dead_code, unused_imports)]

use orbit::{Container, ContainerHost, IntentFailure, IntentJob, Settings};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub use orbit::logging::init_tracing;

/// Upper bound for waits in tests that do not use the harness.
pub const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toast {
    Show(String),
    Number(u32),
}

/// Host with an integer state and `Toast` side effects.
pub struct CounterHost {
    pub container: Container<i64, Toast>,
}

impl CounterHost {
    pub fn new(settings: Settings) -> Self {
        Self {
            container: Container::new(0, settings).expect("inside a runtime"),
        }
    }

    pub fn increment(&self, by: i64) -> IntentJob {
        self.intent(move |ctx| async move {
            ctx.reduce(move |n| n + by).await?;
            anyhow::Ok(())
        })
        .expect("container active")
    }

    pub fn toast(&self, text: &str) -> IntentJob {
        let text = text.to_string();
        self.intent(move |ctx| async move {
            ctx.post_side_effect(Toast::Show(text)).await?;
            anyhow::Ok(())
        })
        .expect("container active")
    }
}

impl ContainerHost for CounterHost {
    type State = i64;
    type SideEffect = Toast;

    fn container(&self) -> &Container<i64, Toast> {
        &self.container
    }
}

/// Exception handler that records every failure it receives.
pub fn recording_handler() -> (Settings, Arc<Mutex<Vec<IntentFailure>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let settings = Settings::builder()
        .exception_handler(move |failure: &IntentFailure| sink.lock().push(failure.clone()))
        .build();
    (settings, seen)
}

/// Await with a real-time bound, panicking on timeout.
pub async fn within<F: std::future::Future>(fut: F) -> F::Output {
    tokio::time::timeout(WAIT, fut)
        .await
        .expect("timed out waiting in test")
}
