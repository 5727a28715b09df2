//! Plugin trait and the registry handed to each container.

use std::sync::Arc;

use crate::error::OrbitError;
use crate::pipeline::operator::{Operator, StageContext, StageOutcome};

/// Strategy wrapped around pipeline stages.
///
/// Every registered plugin sees every stage. `operators` only decides which
/// stages a plugin *owns*: a stage whose operator no plugin owns fails with
/// [`OrbitError::PluginMissing`].
pub trait Plugin: Send + Sync {
    /// Returns the name of this plugin for logging.
    fn name(&self) -> &'static str;

    /// Operators this plugin provides.
    fn operators(&self) -> &[Operator] {
        &[]
    }

    /// Called before the stage starts, in registration order.
    fn before(&self, _stage: &StageContext) {}

    /// Called when the stage ends, in reverse registration order.
    ///
    /// Also called when the stage is cancelled or panics.
    fn after(&self, _stage: &StageContext, _outcome: StageOutcome) {}
}

/// Always-present plugin owning the standard operators.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasePlugin;

impl Plugin for BasePlugin {
    fn name(&self) -> &'static str {
        "base"
    }

    fn operators(&self) -> &[Operator] {
        &Operator::STANDARD
    }

    fn before(&self, stage: &StageContext) {
        tracing::trace!(
            container = %stage.container_id,
            intent = %stage.intent_id,
            operator = %stage.operator,
            "Stage started"
        );
    }

    fn after(&self, stage: &StageContext, outcome: StageOutcome) {
        tracing::trace!(
            container = %stage.container_id,
            intent = %stage.intent_id,
            operator = %stage.operator,
            outcome = ?outcome,
            "Stage finished"
        );
    }
}

/// Ordered plugin list. The base plugin is always first.
#[derive(Clone)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}

impl PluginRegistry {
    /// Registry holding only the base plugin.
    pub fn new() -> Self {
        Self {
            plugins: vec![Arc::new(BasePlugin)],
        }
    }

    /// Append a plugin after those already registered.
    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        tracing::debug!(plugin = plugin.name(), "Registered plugin");
        self.plugins.push(plugin);
        self
    }

    /// The plugin owning `operator`, or a configuration error.
    pub fn require_plugin(&self, operator: Operator) -> Result<&Arc<dyn Plugin>, OrbitError> {
        self.plugins
            .iter()
            .find(|plugin| plugin.operators().contains(&operator))
            .ok_or(OrbitError::PluginMissing { operator })
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|plugin| plugin.name()).collect()
    }
}
