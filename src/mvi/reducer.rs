//! Reducer trait for typed actions.

use super::state::State;

/// Reducer transforms state based on an action.
///
/// It must be a pure function: (State, Action) -> State. Apply one from an
/// intent with [`IntentContext::reduce_with`](crate::IntentContext::reduce_with).
pub trait Reducer {
    /// The state type this reducer operates on.
    type State: State;

    /// The action type this reducer handles.
    type Action: Send;

    /// Process an action and return the new state.
    fn reduce(state: &Self::State, action: Self::Action) -> Self::State;
}
