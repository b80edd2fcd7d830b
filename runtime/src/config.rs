//! Runtime configuration.
//!
//! Defaults match the documented behavior (2000 ms deadline). Values can be
//! overridden with builders or from environment variables.
//!
//! # Environment Variables
//!
//! - `LIFECYCLE_REQUEST_TIMEOUT_MS` - operation deadline in milliseconds
//! - `LIFECYCLE_COMMAND_BUFFER` - command inbox capacity
//! - `LIFECYCLE_BROADCAST_CAPACITY` - buffered notifications per subscriber
//! - `LIFECYCLE_SHUTDOWN_TIMEOUT_MS` - default graceful shutdown timeout
//!
//! # Example
//!
//! ```
//! use lifecycle_runtime::LifecycleConfig;
//! use std::time::Duration;
//!
//! let config = LifecycleConfig::default()
//!     .with_request_timeout(Duration::from_millis(500))
//!     .with_broadcast_capacity(64);
//! assert_eq!(config.request_timeout, Duration::from_millis(500));
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Deadline applied to every operation unless configured otherwise
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(2000);

/// Configuration error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Environment variable could not be parsed
    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue {
        /// Variable name
        var: String,
        /// Raw value found
        value: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// Configuration for a [`Lifecycle`](crate::Lifecycle)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Deadline measured from the moment an operation starts
    pub request_timeout: Duration,
    /// Capacity of the command inbox
    pub command_buffer: usize,
    /// Capacity of the state-change and outcome broadcast channels
    pub broadcast_capacity: usize,
    /// Default timeout for graceful shutdown
    pub shutdown_timeout: Duration,
}

impl LifecycleConfig {
    /// Create a new configuration with custom values
    #[must_use]
    pub const fn new(
        request_timeout: Duration,
        command_buffer: usize,
        broadcast_capacity: usize,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            request_timeout,
            command_buffer,
            broadcast_capacity,
            shutdown_timeout,
        }
    }

    /// Set the operation deadline
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the command inbox capacity
    #[must_use]
    pub const fn with_command_buffer(mut self, capacity: usize) -> Self {
        self.command_buffer = capacity;
        self
    }

    /// Set the broadcast capacity
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Load configuration from environment variables, falling back to defaults
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a variable is set but not a
    /// non-negative integer, or [`ConfigError::Validation`] if the result is
    /// unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary lookup function
    ///
    /// # Errors
    ///
    /// Same as [`LifecycleConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = parse_var(&lookup, "LIFECYCLE_REQUEST_TIMEOUT_MS")? {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var(&lookup, "LIFECYCLE_COMMAND_BUFFER")? {
            config.command_buffer = to_usize("LIFECYCLE_COMMAND_BUFFER", n)?;
        }
        if let Some(n) = parse_var(&lookup, "LIFECYCLE_BROADCAST_CAPACITY")? {
            config.broadcast_capacity = to_usize("LIFECYCLE_BROADCAST_CAPACITY", n)?;
        }
        if let Some(ms) = parse_var(&lookup, "LIFECYCLE_SHUTDOWN_TIMEOUT_MS")? {
            config.shutdown_timeout = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if a capacity is zero or the
    /// deadline is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        // Both tokio channels panic on zero capacity.
        if self.command_buffer == 0 {
            return Err(ConfigError::Validation(
                "command_buffer must be greater than zero".to_string(),
            ));
        }
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::Validation(
                "broadcast_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            command_buffer: 64,
            broadcast_capacity: 16,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

fn parse_var<F>(lookup: &F, var: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|value| {
            value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                var: var.to_string(),
                value,
            })
        })
        .transpose()
}

fn to_usize(var: &str, n: u64) -> Result<usize, ConfigError> {
    usize::try_from(n).map_err(|_| ConfigError::InvalidValue {
        var: var.to_string(),
        value: n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LifecycleConfig::default();
        assert_eq!(config.request_timeout, Duration::from_millis(2000));
        assert_eq!(config.command_buffer, 64);
        assert_eq!(config.broadcast_capacity, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = LifecycleConfig::from_lookup(lookup_from(&[
            ("LIFECYCLE_REQUEST_TIMEOUT_MS", "750"),
            ("LIFECYCLE_COMMAND_BUFFER", " 8 "),
        ]));
        assert_eq!(
            config,
            Ok(LifecycleConfig::default()
                .with_request_timeout(Duration::from_millis(750))
                .with_command_buffer(8))
        );
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let result =
            LifecycleConfig::from_lookup(lookup_from(&[("LIFECYCLE_BROADCAST_CAPACITY", "lots")]));
        assert_eq!(
            result,
            Err(ConfigError::InvalidValue {
                var: "LIFECYCLE_BROADCAST_CAPACITY".to_string(),
                value: "lots".to_string(),
            })
        );
    }

    #[test]
    fn test_zero_values_fail_validation() {
        let result =
            LifecycleConfig::from_lookup(lookup_from(&[("LIFECYCLE_REQUEST_TIMEOUT_MS", "0")]));
        assert!(matches!(result, Err(ConfigError::Validation(_))));

        let config = LifecycleConfig::default().with_command_buffer(0);
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }
}
