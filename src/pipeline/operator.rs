//! Operator identifiers and per-stage context.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

/// A stage kind an intent can run through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Atomic state transition.
    Reduce,
    /// Non-mutating, possibly suspending work off the event loop.
    Transform,
    /// Posting a one-shot side effect.
    SideEffect,
    /// Child body run inside the parent intent.
    SubIntent,
    /// Block that runs only while observers are subscribed.
    RepeatOnSubscription,
    /// Stage defined by host code; needs a plugin that claims it.
    Custom(&'static str),
}

impl Operator {
    /// The operators the base plugin owns.
    pub const STANDARD: [Operator; 5] = [
        Operator::Reduce,
        Operator::Transform,
        Operator::SideEffect,
        Operator::SubIntent,
        Operator::RepeatOnSubscription,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Reduce => "reduce",
            Operator::Transform => "transform",
            Operator::SideEffect => "side_effect",
            Operator::SubIntent => "sub_intent",
            Operator::RepeatOnSubscription => "repeat_on_subscription",
            Operator::Custom(name) => *name,
        }
    }

    /// Whether the stage is bracketed by the idling resource.
    pub fn registers_idling(&self) -> bool {
        matches!(
            self,
            Operator::Reduce | Operator::Transform | Operator::SideEffect
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a plugin sees about the stage it is wrapping.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub container_id: Uuid,
    pub intent_id: Uuid,
    pub intent_name: Option<Arc<str>>,
    pub operator: Operator,
}

/// How a stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    /// The stage future was dropped before finishing.
    Cancelled,
    /// The stage panicked.
    Failed,
}
