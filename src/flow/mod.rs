//! Observable streams owned by a container.
//!
//! - [`StateHolder`] keeps the current state and replays it to every new
//!   [`StateStream`], followed by each later commit (multicast, replay 1).
//! - [`SideEffectChannel`] queues one-shot events; all
//!   [`SideEffectStream`]s pull from the same queue, so each event reaches
//!   at most one subscriber.

mod side_effect;
mod state;
mod subscription;

pub use side_effect::{BufferPolicy, SideEffectChannel, SideEffectStream};
pub use state::{StateHolder, StateStream};
pub use subscription::{SubscriptionToken, SubscriptionTracker};
