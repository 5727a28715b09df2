//! Operator pipeline wrapped around every intent stage.
//!
//! ```text
//! require_plugin → before (declared order) → [idling +1] → stage → [idling -1] → after (reverse order)
//! ```
//!
//! Plugins are strategy objects held in an explicit [`PluginRegistry`]
//! handed to the container at construction. The [`BasePlugin`] is always
//! first and owns the standard operators.

mod operator;
mod plugin;
mod runner;

pub use operator::{Operator, StageContext, StageOutcome};
pub use plugin::{BasePlugin, Plugin, PluginRegistry};
pub use runner::Pipeline;
