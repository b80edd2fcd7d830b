//! Backend capability for executing requests.
//!
//! The coordinator only knows how to ask for an identifier and wait. A backend
//! returns a future that resolves exactly once, either to a payload or to a
//! [`BackendError`]. Backends do not have to support interruption: when an
//! operation is canceled or superseded the coordinator simply stops listening.
//!
//! # Implementations
//!
//! - [`FnBackend`] - wraps a closure
//! - `HttpBackend` (runtime crate) - `GET {base}/{id}` returning a JSON array
//! - `ScriptedBackend` / `ManualBackend` (testing crate) - for tests
//!
//! # Example
//!
//! ```
//! use lifecycle_core::{BackendFuture, FnBackend, RequestBackend};
//!
//! let backend = FnBackend::new(|id: &str| -> BackendFuture {
//!     let len = i64::try_from(id.len()).unwrap_or(i64::MAX);
//!     Box::pin(async move { Ok(vec![len]) })
//! });
//! let _pending = backend.request("abc");
//! ```

use futures::future::BoxFuture;
use std::sync::Arc;
use thiserror::Error;

/// Why a backend resolved without a payload
///
/// The coordinator collapses every variant into
/// [`OperationError::BackendFailure`](crate::OperationError::BackendFailure);
/// the detail is only logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Could not reach the backend
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backend answered with a non-success status
    #[error("Backend returned status {0}")]
    Status(u16),

    /// Payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Payload exceeded the accepted size
    #[error("Response too large (>{0} bytes)")]
    ResponseTooLarge(usize),

    /// Request could not be built for this identifier
    #[error("Invalid request for id '{id}': {reason}")]
    InvalidRequest {
        /// The identifier that was requested
        id: String,
        /// Why the request could not be built
        reason: String,
    },

    /// Any other failure
    #[error("{0}")]
    Other(String),
}

/// Future returned by [`RequestBackend::request`]
pub type BackendFuture = BoxFuture<'static, Result<Vec<i64>, BackendError>>;

/// Request execution capability
///
/// The returned future must be `'static` so the coordinator can drive it on
/// its own task; copy whatever is needed out of `id` before returning.
pub trait RequestBackend: Send + Sync + 'static {
    /// Start a request for `id`
    fn request(&self, id: &str) -> BackendFuture;
}

impl<T> RequestBackend for Arc<T>
where
    T: RequestBackend + ?Sized,
{
    fn request(&self, id: &str) -> BackendFuture {
        (**self).request(id)
    }
}

impl RequestBackend for Box<dyn RequestBackend> {
    fn request(&self, id: &str) -> BackendFuture {
        (**self).request(id)
    }
}

/// Backend built from a closure
#[derive(Clone)]
pub struct FnBackend<F> {
    f: F,
}

impl<F> FnBackend<F>
where
    F: Fn(&str) -> BackendFuture + Send + Sync + 'static,
{
    /// Wrap a closure as a backend
    #[must_use]
    pub const fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> RequestBackend for FnBackend<F>
where
    F: Fn(&str) -> BackendFuture + Send + Sync + 'static,
{
    fn request(&self, id: &str) -> BackendFuture {
        (self.f)(id)
    }
}

impl<F> std::fmt::Debug for FnBackend<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnBackend").finish_non_exhaustive()
    }
}
