//! Backend test doubles.
//!
//! - [`ScriptedBackend`]: replies are scripted per id with a virtual delay.
//!   Pair with a paused tokio clock to lay out a timeline.
//! - [`ManualBackend`]: every request stays pending until the test resolves
//!   it explicitly.
//!
//! Both record the ids they were asked for.

use lifecycle_core::{BackendError, BackendFuture, RequestBackend};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A scripted backend reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    delay: Option<Duration>,
    result: Result<Vec<i64>, BackendError>,
}

impl Reply {
    /// Resolve immediately with `payload`
    #[must_use]
    pub const fn ok(payload: Vec<i64>) -> Self {
        Self {
            delay: Some(Duration::ZERO),
            result: Ok(payload),
        }
    }

    /// Resolve with `payload` after `ms` milliseconds
    #[must_use]
    pub const fn ok_after(ms: u64, payload: Vec<i64>) -> Self {
        Self {
            delay: Some(Duration::from_millis(ms)),
            result: Ok(payload),
        }
    }

    /// Fail after `ms` milliseconds
    #[must_use]
    pub fn fail_after(ms: u64) -> Self {
        Self::error_after(ms, BackendError::Other("scripted failure".to_string()))
    }

    /// Fail with a specific error after `ms` milliseconds
    #[must_use]
    pub const fn error_after(ms: u64, error: BackendError) -> Self {
        Self {
            delay: Some(Duration::from_millis(ms)),
            result: Err(error),
        }
    }

    /// Never resolve
    #[must_use]
    pub const fn never() -> Self {
        Self {
            delay: None,
            result: Ok(Vec::new()),
        }
    }

    fn into_backend_future(self) -> BackendFuture {
        Box::pin(async move {
            match self.delay {
                Some(delay) => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    self.result
                }
                None => futures::future::pending().await,
            }
        })
    }
}

/// Backend whose replies are scripted per id
///
/// Several replies can be queued for one id; they are used in order and the
/// last one repeats. Ids without a script fail immediately.
///
/// # Example
///
/// ```
/// use lifecycle_testing::{Reply, ScriptedBackend};
///
/// let backend = ScriptedBackend::new()
///     .with_reply("slow", Reply::ok_after(3000, vec![0]))
///     .with_reply("ok", Reply::ok_after(1000, vec![1, 2, 3]));
/// assert!(backend.calls().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    replies: Arc<Mutex<HashMap<String, VecDeque<Reply>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedBackend {
    /// Create a backend with no scripts
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `id`
    #[must_use]
    pub fn with_reply(self, id: impl Into<String>, reply: Reply) -> Self {
        lock(&self.replies)
            .entry(id.into())
            .or_default()
            .push_back(reply);
        self
    }

    /// Ids requested so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    fn next_reply(&self, id: &str) -> Reply {
        let mut replies = lock(&self.replies);
        match replies.get_mut(id) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(Reply::never),
            Some(queue) => queue.front().cloned().unwrap_or_else(Reply::never),
            None => Reply::error_after(
                0,
                BackendError::Other(format!("no reply scripted for '{id}'")),
            ),
        }
    }
}

impl RequestBackend for ScriptedBackend {
    fn request(&self, id: &str) -> BackendFuture {
        lock(&self.calls).push(id.to_string());
        self.next_reply(id).into_backend_future()
    }
}

struct PendingRequest {
    id: String,
    reply: oneshot::Sender<Result<Vec<i64>, BackendError>>,
}

/// Backend resolved by hand from the test
///
/// # Example
///
/// ```ignore
/// let backend = ManualBackend::new();
/// let lifecycle = Lifecycle::new(backend.clone());
///
/// lifecycle.send(Command::requested("x")).await?;
/// tokio::task::yield_now().await;
/// assert!(backend.resolve("x", Ok(vec![1])));
/// ```
#[derive(Clone, Default)]
pub struct ManualBackend {
    pending: Arc<Mutex<VecDeque<PendingRequest>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ManualBackend {
    /// Create a backend with nothing pending
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids requested so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Ids of requests still awaited by someone
    #[must_use]
    pub fn pending_ids(&self) -> Vec<String> {
        lock(&self.pending)
            .iter()
            .filter(|p| !p.reply.is_closed())
            .map(|p| p.id.clone())
            .collect()
    }

    /// Resolve the oldest unresolved request for `id`
    ///
    /// Returns `true` if the requester was still listening. A request that
    /// was canceled or superseded returns `false`.
    pub fn resolve(&self, id: &str, result: Result<Vec<i64>, BackendError>) -> bool {
        let request = {
            let mut pending = lock(&self.pending);
            pending
                .iter()
                .position(|p| p.id == id)
                .and_then(|index| pending.remove(index))
        };
        request.is_some_and(|p| p.reply.send(result).is_ok())
    }

    /// Resolve the oldest unresolved request regardless of id
    ///
    /// Returns `true` if the requester was still listening.
    pub fn resolve_next(&self, result: Result<Vec<i64>, BackendError>) -> bool {
        let request = lock(&self.pending).pop_front();
        request.is_some_and(|p| p.reply.send(result).is_ok())
    }
}

impl RequestBackend for ManualBackend {
    fn request(&self, id: &str) -> BackendFuture {
        let (tx, rx) = oneshot::channel();
        lock(&self.calls).push(id.to_string());
        lock(&self.pending).push_back(PendingRequest {
            id: id.to_string(),
            reply: tx,
        });

        Box::pin(async move {
            rx.await
                .unwrap_or_else(|_| Err(BackendError::Other("request abandoned".to_string())))
        })
    }
}

impl std::fmt::Debug for ManualBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualBackend")
            .field("calls", &*lock(&self.calls))
            .field("pending", &lock(&self.pending).len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_scripted_reply_waits_for_delay() {
        let backend = ScriptedBackend::new().with_reply("x", Reply::ok_after(500, vec![1]));
        let start = tokio::time::Instant::now();

        let result = backend.request("x").await;

        assert_eq!(result, Ok(vec![1]));
        assert!(start.elapsed() >= Duration::from_millis(500));
        assert_eq!(backend.calls(), vec!["x".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_replies_are_consumed_in_order_and_last_repeats() {
        let backend = ScriptedBackend::new()
            .with_reply("x", Reply::ok(vec![1]))
            .with_reply("x", Reply::fail_after(0));

        assert_eq!(backend.request("x").await, Ok(vec![1]));
        assert!(backend.request("x").await.is_err());
        assert!(backend.request("x").await.is_err());
    }

    #[tokio::test]
    async fn test_unscripted_id_fails() {
        let backend = ScriptedBackend::new();
        assert!(matches!(backend.request("nope").await, Err(BackendError::Other(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_reply_stays_pending() {
        let backend = ScriptedBackend::new().with_reply("x", Reply::never());
        let result =
            tokio::time::timeout(Duration::from_secs(3600), backend.request("x")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_manual_resolve() {
        let backend = ManualBackend::new();
        let pending = backend.request("x");

        assert_eq!(backend.pending_ids(), vec!["x".to_string()]);
        assert!(backend.resolve("x", Ok(vec![3])));
        assert_eq!(pending.await, Ok(vec![3]));
        assert!(backend.pending_ids().is_empty());
    }

    #[tokio::test]
    async fn test_manual_resolve_after_listener_dropped() {
        let backend = ManualBackend::new();
        drop(backend.request("x"));

        assert!(backend.pending_ids().is_empty());
        assert!(!backend.resolve("x", Ok(vec![1])));
        assert!(!backend.resolve_next(Ok(vec![1])));
    }
}
