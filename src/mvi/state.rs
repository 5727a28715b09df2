//! Marker trait for container state.

/// Bound for values held as container state.
///
/// States should be:
/// - Immutable (Clone to create new states)
/// - Comparable (PartialEq, equal reductions are not emitted)
/// - Shareable across the event loop and observers
pub trait State: Clone + PartialEq + Send + Sync + 'static {}

impl<T> State for T where T: Clone + PartialEq + Send + Sync + 'static {}
