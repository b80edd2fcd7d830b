//! # Request Lifecycle Core
//!
//! Core types for the request lifecycle coordinator.
//!
//! This crate holds everything that is pure: the data model flowing through the
//! system and the fold that turns outcomes into state. Concurrency lives in the
//! runtime crate.
//!
//! ## Core Concepts
//!
//! - **Command**: External input (`Requested`, `Canceled`)
//! - **OutcomeEvent**: Result of an operation (`Received`, `Failed`)
//! - **State**: The observable result (`Success`, `Error`)
//! - **Reducer**: Pure fold `(State, OutcomeEvent) → State`
//! - **Backend**: Injected capability `request(id) → async Result<Vec<i64>>`
//!
//! ## Data Flow
//!
//! ```text
//! Command ──► Coordinator ──► OutcomeEvent ──► Reducer ──► State
//!                  │
//!                  ▼
//!           RequestBackend
//! ```
//!
//! ## Example
//!
//! ```
//! use lifecycle_core::{OutcomeEvent, OutcomeReducer, Reducer, State};
//!
//! let reducer = OutcomeReducer;
//! let state = reducer.reduce(&State::default(), OutcomeEvent::received(vec![1, 2, 3]));
//! assert_eq!(state, State::success(vec![1, 2, 3]));
//! ```

pub use serde::{Deserialize, Serialize};

/// Backend capability (the injected request executor)
pub mod backend;

/// Commands issued by the outside world
pub mod command;

/// Operation failure taxonomy
pub mod error;

/// Outcome events produced by the coordinator
pub mod event;

/// The fold from outcome events to state
pub mod reducer;

/// Externally visible state
pub mod state;

pub use backend::{BackendError, BackendFuture, FnBackend, RequestBackend};
pub use command::Command;
pub use error::OperationError;
pub use event::OutcomeEvent;
pub use reducer::{OutcomeReducer, Reducer};
pub use state::State;
