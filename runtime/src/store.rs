//! State store - holds the latest state and notifies observers.
//!
//! The store is the only owner of its state. Each applied event is folded by
//! the reducer into a fresh value that replaces the old one; readers receive
//! `Arc` snapshots and can never mutate them.
//!
//! Two observation channels exist:
//!
//! - [`Store::subscribe`] - one notification per applied event, even when the
//!   new state equals the old one. Deduplication is left to the reader.
//! - [`Store::watch`] - latest-value semantics, intermediate values may be
//!   skipped. Suited for UIs that only render the newest snapshot.

use crate::metrics::{STATE_CHANGES, counter};
use lifecycle_core::{OutcomeReducer, Reducer, State};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// Default number of notifications buffered per subscriber
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 16;

/// Store specialised to the outcome fold
pub type OutcomeStore = Store<OutcomeReducer>;

/// The Store - folds events into state and publishes snapshots
///
/// Cloning a store yields another handle to the same state.
///
/// # Example
///
/// ```
/// use lifecycle_core::{OutcomeEvent, State};
/// use lifecycle_runtime::OutcomeStore;
///
/// let store = OutcomeStore::default();
/// store.apply(OutcomeEvent::received(vec![1, 2, 3]));
/// assert_eq!(*store.current(), State::success(vec![1, 2, 3]));
/// ```
pub struct Store<R>
where
    R: Reducer,
{
    inner: Arc<Inner<R>>,
}

struct Inner<R>
where
    R: Reducer,
{
    reducer: R,
    state: watch::Sender<Arc<R::State>>,
    changes: broadcast::Sender<Arc<R::State>>,
    events: broadcast::Sender<R::Event>,
}

impl<R> Store<R>
where
    R: Reducer + Send + Sync + 'static,
    R::State: Send + Sync + 'static,
    R::Event: Clone + Send + 'static,
{
    /// Create a new store with initial state and reducer
    #[must_use]
    pub fn new(initial_state: R::State, reducer: R) -> Self {
        Self::with_capacity(initial_state, reducer, DEFAULT_NOTIFICATION_CAPACITY)
    }

    /// Create a new store with a custom notification capacity
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(initial_state: R::State, reducer: R, capacity: usize) -> Self {
        let (state, _) = watch::channel(Arc::new(initial_state));
        let (changes, _) = broadcast::channel(capacity);
        let (events, _) = broadcast::channel(capacity);

        Self {
            inner: Arc::new(Inner {
                reducer,
                state,
                changes,
                events,
            }),
        }
    }

    /// Fold an event into state and notify observers
    ///
    /// The new state is in place before any notification is sent. Returns the
    /// snapshot that was installed.
    pub fn apply(&self, event: R::Event) -> Arc<R::State> {
        let inner = &*self.inner;
        let observed = event.clone();

        let mut installed = None;
        inner.state.send_modify(|current| {
            let next = Arc::new(inner.reducer.reduce(&**current, event));
            installed = Some(Arc::clone(&next));
            *current = next;
        });
        let snapshot = installed.unwrap_or_else(|| inner.state.borrow().clone());

        counter!(STATE_CHANGES).increment(1);

        if inner.changes.send(Arc::clone(&snapshot)).is_err() {
            tracing::trace!("State changed with no subscribers");
        }
        if inner.events.send(observed).is_err() {
            tracing::trace!("Event applied with no event subscribers");
        }

        snapshot
    }

    /// Current state snapshot
    ///
    /// Calling this twice with no event applied in between returns the same
    /// `Arc`.
    #[must_use]
    pub fn current(&self) -> Arc<R::State> {
        self.inner.state.borrow().clone()
    }

    /// Read current state via a closure
    ///
    /// ```ignore
    /// let failed = store.state(|s| s.is_error());
    /// ```
    pub fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&R::State) -> T,
    {
        let state = self.inner.state.borrow();
        f(&**state)
    }

    /// Subscribe to every state change
    ///
    /// If the receiver lags it skips old snapshots and receives
    /// [`RecvError::Lagged`](broadcast::error::RecvError::Lagged).
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<R::State>> {
        self.inner.changes.subscribe()
    }

    /// Watch the latest state
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Arc<R::State>> {
        self.inner.state.subscribe()
    }

    /// Subscribe to the events applied to this store
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<R::Event> {
        self.inner.events.subscribe()
    }
}

impl<R> Clone for Store<R>
where
    R: Reducer,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for Store<OutcomeReducer> {
    fn default() -> Self {
        Self::new(State::default(), OutcomeReducer)
    }
}

impl<R> std::fmt::Debug for Store<R>
where
    R: Reducer,
    R::State: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("state", &*self.inner.state.borrow())
            .field("subscribers", &self.inner.changes.receiver_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifecycle_core::{OperationError, OutcomeEvent};

    #[test]
    fn test_initial_state_is_default() {
        let store = OutcomeStore::default();
        assert_eq!(*store.current(), State::default());
    }

    #[test]
    fn test_apply_replaces_snapshot() {
        let store = OutcomeStore::default();
        let before = store.current();

        let after = store.apply(OutcomeEvent::received(vec![1, 2, 3]));

        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(*before, State::default());
        assert_eq!(*after, State::success(vec![1, 2, 3]));
        assert!(Arc::ptr_eq(&after, &store.current()));
    }

    #[test]
    fn test_reads_are_stable_without_events() {
        let store = OutcomeStore::default();
        let first = store.current();
        let second = store.current();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(store.state(State::is_success));
    }

    #[tokio::test]
    async fn test_every_event_notifies_once_even_if_equal() {
        let store = OutcomeStore::default();
        let mut rx = store.subscribe();

        store.apply(OutcomeEvent::failed(OperationError::Timeout));
        store.apply(OutcomeEvent::failed(OperationError::Timeout));

        let first = rx.recv().await;
        let second = rx.recv().await;
        assert!(matches!(first, Ok(ref s) if **s == State::error("timeout")));
        assert!(matches!(second, Ok(ref s) if **s == State::error("timeout")));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_notification_sees_replaced_state() {
        let store = OutcomeStore::default();
        let mut rx = store.subscribe();

        store.apply(OutcomeEvent::received(vec![9]));

        let notified = rx.recv().await;
        assert!(matches!(notified, Ok(ref s) if Arc::ptr_eq(s, &store.current())));
    }

    #[tokio::test]
    async fn test_watch_and_event_subscribers() {
        let store = OutcomeStore::default();
        let mut watcher = store.watch();
        let mut events = store.subscribe_events();

        store.apply(OutcomeEvent::received(vec![4]));

        assert!(watcher.changed().await.is_ok());
        assert_eq!(**watcher.borrow(), State::success(vec![4]));
        assert_eq!(events.recv().await.ok(), Some(OutcomeEvent::received(vec![4])));
    }

    #[tokio::test]
    async fn test_apply_without_subscribers_still_replaces_state() {
        let store = OutcomeStore::default();

        store.apply(OutcomeEvent::received(vec![6]));
        let mut events = store.subscribe_events();
        let mut changes = store.subscribe();

        assert_eq!(*store.current(), State::success(vec![6]));
        assert!(events.try_recv().is_err());
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn test_independent_stores_do_not_share_state() {
        let a = OutcomeStore::default();
        let b = OutcomeStore::default();

        a.apply(OutcomeEvent::received(vec![1]));

        assert_eq!(*a.current(), State::success(vec![1]));
        assert_eq!(*b.current(), State::default());
    }

    #[test]
    fn test_clone_shares_state() {
        let a = OutcomeStore::default();
        let b = a.clone();

        b.apply(OutcomeEvent::received(vec![2]));

        assert_eq!(*a.current(), State::success(vec![2]));
    }
}
