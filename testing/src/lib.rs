//! # Request Lifecycle Testing
//!
//! Testing utilities and helpers for the request lifecycle coordinator.
//!
//! This crate provides:
//! - Backend test doubles ([`ScriptedBackend`], [`ManualBackend`])
//! - A Given-When-Then harness for reducers ([`ReducerTest`])
//! - Property-based testing strategies
//! - Assertion helpers for state
//!
//! Timing is simulated with tokio's paused clock: run tests with
//! `#[tokio::test(start_paused = true)]` and scripted delays elapse instantly
//! yet in the right order.
//!
//! ## Example
//!
//! ```ignore
//! use lifecycle_testing::{Reply, ScriptedBackend};
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_success() {
//!     let backend = ScriptedBackend::new().with_reply("x", Reply::ok_after(30, vec![1, 2, 3]));
//!     let lifecycle = Lifecycle::new(backend);
//!
//!     lifecycle.send(Command::requested("x")).await.unwrap();
//!     tokio::time::sleep(Duration::from_millis(100)).await;
//!
//!     assert_eq!(*lifecycle.current(), State::success(vec![1, 2, 3]));
//! }
//! ```

/// Backend test doubles
pub mod mocks;


/// Property-based testing utilities
///
/// Strategies for the core data model, for use with `proptest!`.
pub mod properties {
    use lifecycle_core::{Command, OperationError, OutcomeEvent, State};
    use proptest::prelude::*;

    /// Arbitrary payload
    pub fn arb_payload() -> impl Strategy<Value = Vec<i64>> {
        prop::collection::vec(any::<i64>(), 0..16)
    }

    /// Arbitrary outcome event, failures limited to the two real messages
    pub fn arb_outcome() -> impl Strategy<Value = OutcomeEvent> {
        prop_oneof![
            arb_payload().prop_map(OutcomeEvent::received),
            Just(OutcomeEvent::failed(OperationError::BackendFailure)),
            Just(OutcomeEvent::failed(OperationError::Timeout)),
        ]
    }

    /// Arbitrary state
    pub fn arb_state() -> impl Strategy<Value = State> {
        prop_oneof![
            arb_payload().prop_map(State::success),
            Just(State::error("request failed")),
            Just(State::error("timeout")),
        ]
    }

    /// Arbitrary command over a small id alphabet, so ids repeat
    pub fn arb_command() -> impl Strategy<Value = Command> {
        prop_oneof![
            3 => "[a-c]".prop_map(Command::requested),
            1 => Just(Command::canceled()),
        ]
    }
}

/// Assertion helpers for state
pub mod assertions {
    use lifecycle_core::State;

    /// Assert that state is `Success` with the given payload
    ///
    /// # Panics
    ///
    /// Panics if state is not `Success { value: expected }`.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_success(state: &State, expected: &[i64]) {
        assert_eq!(
            state.value(),
            Some(expected),
            "Expected Success({expected:?}), found {state:?}"
        );
    }

    /// Assert that state is `Error` with the given message
    ///
    /// # Panics
    ///
    /// Panics if state is not `Error { message: expected }`.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_error(state: &State, expected: &str) {
        assert_eq!(
            state.message(),
            Some(expected),
            "Expected Error({expected:?}), found {state:?}"
        );
    }
}

/// Install a tracing subscriber that writes through the test harness
///
/// Honors `RUST_LOG`. Safe to call from every test; only the first call
/// installs anything.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lifecycle_runtime=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{ManualBackend, Reply, ScriptedBackend};
pub use reducer_test::ReducerTest;
