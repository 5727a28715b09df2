//! Runs one stage through the registered plugins.

use std::future::Future;
use std::sync::Arc;

use scopeguard::ScopeGuard;

use crate::error::OrbitError;
use crate::idling::{IdlingGuard, IdlingResource};
use crate::pipeline::operator::{StageContext, StageOutcome};
use crate::pipeline::plugin::{Plugin, PluginRegistry};

/// Registry plus idling resource for one container.
#[derive(Clone)]
pub struct Pipeline {
    registry: Arc<PluginRegistry>,
    idling: Arc<dyn IdlingResource>,
}

impl Pipeline {
    pub fn new(registry: Arc<PluginRegistry>, idling: Arc<dyn IdlingResource>) -> Self {
        Self { registry, idling }
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Run `stage_future` as `stage.operator`.
    ///
    /// `register_idling` brackets the stage with the idling resource when
    /// the operator is idling-aware. `after` hooks run even if the returned
    /// future is dropped mid-stage.
    pub async fn run<T, F>(
        &self,
        stage: StageContext,
        register_idling: bool,
        stage_future: F,
    ) -> Result<T, OrbitError>
    where
        F: Future<Output = T>,
    {
        self.registry.require_plugin(stage.operator)?;

        let plugins: Vec<Arc<dyn Plugin>> = self.registry.plugins().to_vec();
        for plugin in &plugins {
            plugin.before(&stage);
        }

        let idle = (register_idling && stage.operator.registers_idling())
            .then(|| IdlingGuard::new(Arc::clone(&self.idling)));

        let hooks = scopeguard::guard((stage, plugins), |(stage, plugins)| {
            let outcome = if std::thread::panicking() {
                StageOutcome::Failed
            } else {
                StageOutcome::Cancelled
            };
            for plugin in plugins.iter().rev() {
                plugin.after(&stage, outcome);
            }
        });

        let output = stage_future.await;
        drop(idle);

        let (stage, plugins) = ScopeGuard::into_inner(hooks);
        for plugin in plugins.iter().rev() {
            plugin.after(&stage, StageOutcome::Completed);
        }
        Ok(output)
    }
}
