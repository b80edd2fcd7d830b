//! Property tests for command sequences
//!
//! Commands arrive every 10ms and every backend reply takes 100ms, so only
//! the last request of a sequence can ever complete.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code

use lifecycle_core::{Command, OutcomeEvent, State};
use lifecycle_runtime::Lifecycle;
use lifecycle_testing::properties::arb_command;
use lifecycle_testing::{Reply, ScriptedBackend};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn payload_for(id: &str) -> Vec<i64> {
    id.bytes().map(i64::from).collect()
}

fn backend() -> ScriptedBackend {
    ["a", "b", "c"].into_iter().fold(ScriptedBackend::new(), |backend, id| {
        backend.with_reply(id, Reply::ok_after(100, payload_for(id)))
    })
}

struct Run {
    initial_unchanged: bool,
    outcomes: Vec<OutcomeEvent>,
    final_state: State,
}

fn run(commands: Vec<Command>) -> Run {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap();

    runtime.block_on(async move {
        let lifecycle = Lifecycle::new(backend());
        let initial = lifecycle.current();
        let mut outcomes_rx = lifecycle.subscribe_outcomes();

        for command in commands {
            lifecycle.send(command).await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_secs(5)).await;

        let mut outcomes = Vec::new();
        while let Ok(event) = outcomes_rx.try_recv() {
            outcomes.push(event);
        }
        let current = lifecycle.current();

        Run {
            initial_unchanged: Arc::ptr_eq(&initial, &current),
            outcomes,
            final_state: (*current).clone(),
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_only_the_last_request_can_complete(
        commands in prop::collection::vec(arb_command(), 1..12)
    ) {
        let last = commands.last().cloned();
        let result = run(commands);

        match last {
            Some(Command::Requested { id }) => {
                prop_assert_eq!(result.outcomes, vec![OutcomeEvent::received(payload_for(&id))]);
                prop_assert_eq!(result.final_state, State::success(payload_for(&id)));
            }
            _ => {
                prop_assert!(result.outcomes.is_empty());
                prop_assert!(result.initial_unchanged);
            }
        }
    }
}
