use std::time::Duration;

use thiserror::Error;

use crate::error::{IntentFailure, OrbitError};

/// Why a test session assertion failed.
#[derive(Debug, Error)]
pub enum TestError {
    #[error("Expected {expected} but got {actual}")]
    UnexpectedItem {
        expected: &'static str,
        actual: String,
    },

    #[error("Expected {expected} but got {actual}")]
    Mismatch { expected: String, actual: String },

    #[error("Timed out after {timeout:?} waiting for {waiting_for}")]
    Timeout {
        waiting_for: &'static str,
        timeout: Duration,
    },

    #[error("Container stopped emitting while waiting for {waiting_for}")]
    Closed { waiting_for: &'static str },

    #[error("Expected no more items but found {}: {}", .0.len(), .0.join(", "))]
    UnconsumedItems(Vec<String>),

    #[error("Intents failed without an exception handler: {}", describe(.0))]
    UnhandledFailures(Vec<IntentFailure>),

    #[error(transparent)]
    Orbit(#[from] OrbitError),
}

fn describe(failures: &[IntentFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_item_names_both_sides() {
        let err = TestError::UnexpectedItem {
            expected: "State",
            actual: "SideEffect(\"toast\")".to_string(),
        };
        assert_eq!(err.to_string(), "Expected State but got SideEffect(\"toast\")");
    }

    #[test]
    fn unconsumed_items_are_listed() {
        let err = TestError::UnconsumedItems(vec!["State(1)".into(), "State(2)".into()]);
        assert_eq!(
            err.to_string(),
            "Expected no more items but found 2: State(1), State(2)"
        );
    }
}
