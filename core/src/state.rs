//! Externally visible state.

use serde::{Deserialize, Serialize};

/// Latest outcome as seen by readers
///
/// Starts as `Success { value: [] }`. The store replaces the whole value on
/// every accepted outcome and never mutates it in place.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    /// Last operation produced a payload
    Success {
        /// The payload
        value: Vec<i64>,
    },

    /// Last operation failed
    Error {
        /// `"request failed"` or `"timeout"`
        message: String,
    },
}

impl State {
    /// Build a `Success` state
    #[must_use]
    pub const fn success(value: Vec<i64>) -> Self {
        Self::Success { value }
    }

    /// Build an `Error` state
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Check if this is a `Success` state
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Check if this is an `Error` state
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Payload of a `Success` state
    #[must_use]
    pub fn value(&self) -> Option<&[i64]> {
        match self {
            Self::Success { value } => Some(value.as_slice()),
            Self::Error { .. } => None,
        }
    }

    /// Message of an `Error` state
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Error { message } => Some(message.as_str()),
        }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::Success { value: Vec::new() }
    }
}
