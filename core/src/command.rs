//! Commands issued by the outside world.
//!
//! Commands are the only input the coordinator accepts. They never touch
//! state directly: a `Requested` starts an operation whose outcome may later
//! change state, and a `Canceled` only discards whatever is in flight.

use serde::{Deserialize, Serialize};

/// An externally issued instruction
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Start a new operation for `id`, superseding any active one
    Requested {
        /// Identifier handed to the backend. Not required to be unique.
        id: String,
    },

    /// Abort the active operation, if any
    Canceled,
}

impl Command {
    /// Build a `Requested` command
    #[must_use]
    pub fn requested(id: impl Into<String>) -> Self {
        Self::Requested { id: id.into() }
    }

    /// Build a `Canceled` command
    #[must_use]
    pub const fn canceled() -> Self {
        Self::Canceled
    }

    /// Short name used for log fields and metric labels
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Requested { .. } => "requested",
            Self::Canceled => "canceled",
        }
    }
}
