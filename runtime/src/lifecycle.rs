//! Lifecycle - a coordinator wired to a store.
//!
//! This is the composed system most callers want: commands go in through
//! [`Lifecycle::send`], outcomes are folded into an [`OutcomeStore`], and the
//! resulting state is read with [`Lifecycle::current`] or observed with
//! [`Lifecycle::subscribe`].

use crate::config::LifecycleConfig;
use crate::coordinator::{Coordinator, CoordinatorHandle};
use crate::error::LifecycleError;
use crate::store::{OutcomeStore, Store};
use lifecycle_core::{Command, OutcomeEvent, OutcomeReducer, RequestBackend, State};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, mpsc, watch};

/// A running request lifecycle
///
/// Cloning yields another handle to the same coordinator and store.
///
/// # Example
///
/// ```ignore
/// let lifecycle = Lifecycle::new(HttpBackend::new("https://api.example.com/items")?);
///
/// let state = lifecycle
///     .send_and_wait(Command::requested("42"), Duration::from_secs(5))
///     .await?;
/// println!("{state:?}");
/// ```
#[derive(Clone)]
pub struct Lifecycle {
    store: OutcomeStore,
    commands: mpsc::Sender<Command>,
    shutdown: Arc<AtomicBool>,
    coordinator: Arc<Mutex<Option<CoordinatorHandle>>>,
    config: LifecycleConfig,
}

impl Lifecycle {
    /// Start a lifecycle with default configuration
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn new<B>(backend: B) -> Self
    where
        B: RequestBackend,
    {
        Self::start(backend, LifecycleConfig::default())
    }

    /// Start a lifecycle with custom configuration
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Config`] if `config` fails
    /// [`LifecycleConfig::validate`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn with_config<B>(backend: B, config: LifecycleConfig) -> Result<Self, LifecycleError>
    where
        B: RequestBackend,
    {
        config.validate()?;
        Ok(Self::start(backend, config))
    }

    fn start<B>(backend: B, config: LifecycleConfig) -> Self
    where
        B: RequestBackend,
    {
        let store =
            Store::with_capacity(State::default(), OutcomeReducer, config.broadcast_capacity);
        let handle = Coordinator::spawn(backend, store.clone(), &config);

        tracing::debug!(
            timeout_ms = config.request_timeout.as_millis(),
            "Lifecycle started"
        );

        Self {
            store,
            commands: handle.sender(),
            shutdown: Arc::new(AtomicBool::new(false)),
            coordinator: Arc::new(Mutex::new(Some(handle))),
            config,
        }
    }

    /// Send a command to the coordinator
    ///
    /// Returns once the command is queued, not once it has been handled.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::ShutdownInProgress`] after [`Lifecycle::shutdown`]
    /// - [`LifecycleError::ChannelClosed`] if the coordinator has stopped
    #[tracing::instrument(
        skip(self, command),
        fields(command = command.name()),
        name = "lifecycle_send"
    )]
    pub async fn send(&self, command: Command) -> Result<(), LifecycleError> {
        if self.shutdown.load(Ordering::Acquire) {
            tracing::warn!("Rejected command: lifecycle is shutting down");
            return Err(LifecycleError::ShutdownInProgress);
        }

        self.commands
            .send(command)
            .await
            .map_err(|_| LifecycleError::ChannelClosed)
    }

    /// Send a command and wait for the next state change
    ///
    /// Subscribes before sending, so the change caused by this command cannot
    /// be missed. Commands that produce no outcome (a `Canceled`, or a
    /// `Requested` later superseded) end in [`LifecycleError::Timeout`].
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::Timeout`] if no change happens within `timeout`
    /// - [`LifecycleError::ChannelClosed`] if the store's channel closed
    /// - any error from [`Lifecycle::send`]
    #[tracing::instrument(
        skip(self, command, timeout),
        fields(command = command.name(), timeout_ms = timeout.as_millis()),
        name = "lifecycle_send_and_wait"
    )]
    pub async fn send_and_wait(
        &self,
        command: Command,
        timeout: Duration,
    ) -> Result<Arc<State>, LifecycleError> {
        let mut rx = self.store.subscribe();

        self.send(command).await?;

        tokio::time::timeout(timeout, async {
            loop {
                match rx.recv().await {
                    Ok(state) => return Ok(state),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "State observer lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(LifecycleError::ChannelClosed);
                    }
                }
            }
        })
        .await
        .map_err(|_| LifecycleError::Timeout)?
    }

    /// Current state snapshot
    #[must_use]
    pub fn current(&self) -> Arc<State> {
        self.store.current()
    }

    /// Read current state via a closure
    pub fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&State) -> T,
    {
        self.store.state(f)
    }

    /// Subscribe to every state change
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<State>> {
        self.store.subscribe()
    }

    /// Watch the latest state
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Arc<State>> {
        self.store.watch()
    }

    /// Subscribe to emitted outcome events
    #[must_use]
    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<OutcomeEvent> {
        self.store.subscribe_events()
    }

    /// Configuration this lifecycle was started with
    #[must_use]
    pub const fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Stop the coordinator using the configured shutdown timeout
    ///
    /// # Errors
    ///
    /// See [`Lifecycle::shutdown`].
    pub async fn shutdown_default(&self) -> Result<(), LifecycleError> {
        self.shutdown(self.config.shutdown_timeout).await
    }

    /// Stop the coordinator
    ///
    /// New commands are rejected immediately. The active operation, if any,
    /// is detached without an outcome; state keeps its last value and stays
    /// readable. Calling this twice is harmless.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::ShutdownTimeout`] if the loop did not exit in time
    /// - [`LifecycleError::TaskJoin`] if the coordinator task panicked
    #[tracing::instrument(skip(self), name = "lifecycle_shutdown")]
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), LifecycleError> {
        tracing::info!("Initiating lifecycle shutdown");
        self.shutdown.store(true, Ordering::Release);

        let Some(handle) = self.coordinator.lock().await.take() else {
            tracing::debug!("Lifecycle already shut down");
            return Ok(());
        };

        match tokio::time::timeout(timeout, handle.shutdown()).await {
            Ok(Ok(())) => {
                tracing::info!("Lifecycle shutdown complete");
                Ok(())
            }
            Ok(Err(join_error)) => Err(LifecycleError::TaskJoin(join_error)),
            Err(_) => {
                tracing::error!("Coordinator did not stop within timeout");
                Err(LifecycleError::ShutdownTimeout)
            }
        }
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("store", &self.store)
            .field("shutdown", &self.shutdown.load(Ordering::Acquire))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
