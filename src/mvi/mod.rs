//! Model-View-Intent contracts shared by every container.
//!
//! ```text
//! Intent ──→ Reducer ──→ State ──→ View
//!    ↑                              │
//!    └──────── SideEffect ←─────────┘
//! ```
//!
//! - **State**: immutable value, one current copy per container
//! - **SideEffect**: one-shot event with no current value
//! - **Reducer**: pure `(State, Action) -> State` function

mod reducer;
mod side_effect;
mod state;

pub use reducer::Reducer;
pub use side_effect::SideEffect;
pub use state::State;
