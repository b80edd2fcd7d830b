//! Prometheus metrics for observability and monitoring.
//!
//! The coordinator and store record through the `metrics` facade. Nothing is
//! exported unless a recorder is installed, e.g. with [`MetricsServer`].
//!
//! # Metrics
//!
//! - `lifecycle_commands_total{command}` - commands processed
//! - `lifecycle_operations_started_total` - operations started
//! - `lifecycle_operations_detached_total{reason}` - operations canceled or superseded
//! - `lifecycle_outcomes_total{outcome}` - outcomes emitted
//! - `lifecycle_operation_duration_seconds` - time from start to outcome
//! - `lifecycle_state_changes_total` - state replacements in the store
//!
//! # Example
//!
//! ```rust,no_run
//! use lifecycle_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! println!("{}", server.render().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Commands processed, labelled by `command`
pub const COMMANDS_TOTAL: &str = "lifecycle_commands_total";
/// Operations started
pub const OPERATIONS_STARTED: &str = "lifecycle_operations_started_total";
/// Operations detached before an outcome, labelled by `reason`
pub const OPERATIONS_DETACHED: &str = "lifecycle_operations_detached_total";
/// Outcomes emitted, labelled by `outcome`
pub const OUTCOMES_TOTAL: &str = "lifecycle_outcomes_total";
/// Time from operation start to outcome
pub const OPERATION_DURATION: &str = "lifecycle_operation_duration_seconds";
/// State replacements performed by the store
pub const STATE_CHANGES: &str = "lifecycle_state_changes_total";

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics exporter.
///
/// Installs a global recorder; `render()` yields the scrape payload for
/// whatever HTTP layer the host application uses.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address the host application will serve `/metrics` on
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Describe metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g. in tests) this logs a warning
    /// and succeeds without a handle.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!(
                        "Metrics recorder already initialized, skipping re-initialization"
                    );
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Address this server was configured with
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if no recorder was installed by this server.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(COMMANDS_TOTAL, "Total number of commands processed by the coordinator");
    describe_counter!(OPERATIONS_STARTED, "Total number of operations started");
    describe_counter!(
        OPERATIONS_DETACHED,
        "Total number of operations canceled or superseded before an outcome"
    );
    describe_counter!(OUTCOMES_TOTAL, "Total number of outcome events emitted");
    describe_histogram!(
        OPERATION_DURATION,
        "Time from operation start to its outcome"
    );
    describe_counter!(STATE_CHANGES, "Total number of state replacements");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_without_start_is_none() {
        let server = MetricsServer::new(SocketAddr::from(([127, 0, 0, 1], 9090)));
        assert!(server.render().is_none());
        assert_eq!(server.addr().port(), 9090);
    }

    #[test]
    fn test_register_metrics_without_recorder() {
        // Describing metrics with no recorder installed is a no-op.
        register_metrics();
    }
}
