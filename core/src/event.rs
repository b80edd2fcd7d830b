//! Outcome events produced by the coordinator.
//!
//! At most one outcome is produced per accepted `Requested` command. The
//! store folds each outcome into state.

use crate::error::OperationError;
use serde::{Deserialize, Serialize};

/// Terminal result of an operation
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeEvent {
    /// The backend produced a payload
    Received {
        /// Payload returned by the backend
        response: Vec<i64>,
    },

    /// The operation failed (`"request failed"` or `"timeout"`)
    Failed {
        /// Failure message
        error: String,
    },
}

impl OutcomeEvent {
    /// Build a `Received` event
    #[must_use]
    pub const fn received(response: Vec<i64>) -> Self {
        Self::Received { response }
    }

    /// Build a `Failed` event from an operation error
    #[must_use]
    pub fn failed(error: OperationError) -> Self {
        Self::Failed {
            error: error.to_string(),
        }
    }

    /// Short name used for log fields and metric labels
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Received { .. } => "received",
            Self::Failed { .. } => "failed",
        }
    }
}

impl From<OperationError> for OutcomeEvent {
    fn from(error: OperationError) -> Self {
        Self::failed(error)
    }
}
