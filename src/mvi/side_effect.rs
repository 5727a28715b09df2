//! Marker trait for side effects.

/// Bound for one-shot side effect payloads (navigation, toasts, ...).
pub trait SideEffect: Send + 'static {}

impl<T> SideEffect for T where T: Send + 'static {}
