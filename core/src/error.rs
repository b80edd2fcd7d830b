//! Operation failure taxonomy.
//!
//! Only two failures are ever surfaced as state. A superseded or canceled
//! operation is not a failure and has no variant here.

use thiserror::Error;

/// Why an operation ended without a payload
///
/// The `Display` output is the exact `error` string carried by
/// [`OutcomeEvent::Failed`](crate::OutcomeEvent::Failed).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationError {
    /// The backend resolved to a failure
    #[error("request failed")]
    BackendFailure,

    /// The backend did not resolve before the deadline
    #[error("timeout")]
    Timeout,
}

impl OperationError {
    /// Short name used for metric labels
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BackendFailure => "backend_failure",
            Self::Timeout => "timeout",
        }
    }
}
