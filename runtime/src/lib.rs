//! # Request Lifecycle Runtime
//!
//! Runtime for the request lifecycle coordinator.
//!
//! This crate owns all concurrency: the coordinator loop that starts, cancels,
//! and races operations, and the store that folds their outcomes into state.
//!
//! ## Core Components
//!
//! - **Coordinator**: Task loop enforcing single-flight, cancellation, and deadline
//! - **Store**: Holds the latest state, folds outcomes, notifies observers
//! - **Lifecycle**: A coordinator wired into a store
//!
//! ## Example
//!
//! ```ignore
//! use lifecycle_runtime::{HttpBackend, Lifecycle};
//! use lifecycle_core::Command;
//!
//! let lifecycle = Lifecycle::new(HttpBackend::new("https://api.example.com/items")?);
//!
//! // Send a command
//! lifecycle.send(Command::requested("42")).await?;
//!
//! // Read state
//! let failed = lifecycle.state(|s| s.is_error());
//! ```

/// Runtime configuration
pub mod config;

/// Coordinator task loop
pub mod coordinator;

/// HTTP backend adapter
pub mod http;

/// Coordinator wired to a store
pub mod lifecycle;

/// Prometheus metrics for observability
pub mod metrics;

/// State store
pub mod store;

/// Error types for the lifecycle runtime
pub mod error {
    use thiserror::Error;

    /// Errors returned by [`Lifecycle`](crate::Lifecycle) handles
    ///
    /// These describe misuse of the handle or its shutdown. Operation failures
    /// never appear here; they are folded into state.
    #[derive(Error, Debug)]
    pub enum LifecycleError {
        /// Lifecycle is shutting down and not accepting new commands
        #[error("Lifecycle is shutting down")]
        ShutdownInProgress,

        /// Coordinator or notification channel closed
        #[error("Lifecycle channel closed")]
        ChannelClosed,

        /// Timeout waiting for a state change
        ///
        /// Returned by `send_and_wait` when no change arrives in time.
        #[error("Timeout waiting for state change")]
        Timeout,

        /// Coordinator did not stop within the shutdown timeout
        #[error("Shutdown timed out")]
        ShutdownTimeout,

        /// Configuration rejected at startup
        #[error("Invalid configuration: {0}")]
        Config(#[from] crate::config::ConfigError),

        /// The coordinator task panicked
        #[error("Coordinator task failed: {0}")]
        TaskJoin(#[from] tokio::task::JoinError),
    }
}

pub use config::{ConfigError, DEFAULT_REQUEST_TIMEOUT, LifecycleConfig};
pub use coordinator::{Coordinator, CoordinatorHandle, OutcomeSink};
pub use error::LifecycleError;
pub use http::HttpBackend;
pub use lifecycle::Lifecycle;
pub use store::{OutcomeStore, Store};
