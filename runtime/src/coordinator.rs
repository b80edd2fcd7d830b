//! Lifecycle coordinator - single-flight request execution.
//!
//! The coordinator is a task loop that owns exactly one slot for the active
//! operation. Every iteration waits on whichever of these completes first:
//!
//! 1. shutdown signal
//! 2. next command
//! 3. deadline of the active operation
//! 4. backend result of the active operation
//!
//! The `select!` is biased in that order. Commands win ties against
//! completions, so a `Canceled` that is already queued always discards the
//! operation. The deadline wins ties against the backend (timer-fires-first).
//!
//! ```text
//!              Requested(id)
//!   ┌──────┐ ───────────────► ┌────────┐  backend ok   ──► Received
//!   │ Idle │                  │ Active │  backend err  ──► Failed("request failed")
//!   └──────┘ ◄─────────────── └────────┘  deadline     ──► Failed("timeout")
//!              Canceled /         │
//!              outcome            └─ Requested(id') ─► detach, start id'
//! ```
//!
//! Detaching an operation aborts the task driving its backend future, so a
//! late result can never be observed.

use crate::config::LifecycleConfig;
use crate::metrics::{
    COMMANDS_TOTAL, OPERATION_DURATION, OPERATIONS_DETACHED, OPERATIONS_STARTED, OUTCOMES_TOTAL,
    counter, histogram,
};
use crate::store::Store;
use lifecycle_core::{BackendError, Command, OperationError, OutcomeEvent, Reducer, RequestBackend};
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, Sleep};

/// Destination for outcome events
///
/// Implemented by [`Store`] (fold in place) and by unbounded senders (expose
/// the raw outcome stream).
pub trait OutcomeSink: Send + Sync + 'static {
    /// Deliver one outcome
    fn emit(&self, event: OutcomeEvent);
}

impl OutcomeSink for mpsc::UnboundedSender<OutcomeEvent> {
    fn emit(&self, event: OutcomeEvent) {
        if self.send(event).is_err() {
            tracing::trace!("Outcome receiver dropped, discarding outcome");
        }
    }
}

impl<R> OutcomeSink for Store<R>
where
    R: Reducer<Event = OutcomeEvent> + Send + Sync + 'static,
    R::State: Send + Sync + 'static,
{
    fn emit(&self, event: OutcomeEvent) {
        self.apply(event);
    }
}

/// The in-flight operation
///
/// Dropping it aborts the backend task, which detaches the operation.
struct ActiveOperation {
    id: String,
    seq: u64,
    started: Instant,
    deadline: Pin<Box<Sleep>>,
    response: JoinHandle<Result<Vec<i64>, BackendError>>,
}

impl Drop for ActiveOperation {
    fn drop(&mut self) {
        self.response.abort();
    }
}

/// What woke the loop
enum Step {
    /// The shutdown channel changed or its sender was dropped
    ShutdownSignal { sender_alive: bool },
    Command(Option<Command>),
    DeadlineElapsed,
    Resolved(Result<Result<Vec<i64>, BackendError>, JoinError>),
}

/// The coordinator task
///
/// Construct with [`Coordinator::new`] and drive with [`Coordinator::run`],
/// or use [`Coordinator::spawn`] to get a [`CoordinatorHandle`].
pub struct Coordinator<B, K> {
    backend: B,
    sink: K,
    request_timeout: Duration,
    commands: mpsc::Receiver<Command>,
    shutdown: watch::Receiver<bool>,
    active: Option<ActiveOperation>,
    next_seq: u64,
}

impl<B, K> Coordinator<B, K>
where
    B: RequestBackend,
    K: OutcomeSink,
{
    /// Create a coordinator reading from `commands` and emitting into `sink`
    ///
    /// The loop ends when `true` is sent on `shutdown`, its sender is
    /// dropped, or every command sender is dropped. Sending `false` is
    /// ignored.
    #[must_use]
    pub const fn new(
        backend: B,
        sink: K,
        request_timeout: Duration,
        commands: mpsc::Receiver<Command>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            backend,
            sink,
            request_timeout,
            commands,
            shutdown,
            active: None,
            next_seq: 0,
        }
    }

    /// Spawn a coordinator on the current tokio runtime
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime or if `config.command_buffer`
    /// is zero.
    #[must_use]
    pub fn spawn(backend: B, sink: K, config: &LifecycleConfig) -> CoordinatorHandle {
        let (commands_tx, commands_rx) = mpsc::channel(config.command_buffer);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let coordinator = Self::new(
            backend,
            sink,
            config.request_timeout,
            commands_rx,
            shutdown_rx,
        );
        let task = tokio::spawn(coordinator.run());

        CoordinatorHandle {
            commands: commands_tx,
            shutdown: shutdown_tx,
            task,
        }
    }

    /// Run the loop until shutdown
    ///
    /// Commands are handled one at a time in arrival order. Any operation
    /// still active when the loop ends is detached without an outcome.
    pub async fn run(mut self) {
        tracing::info!(
            timeout_ms = self.request_timeout.as_millis(),
            "Coordinator started"
        );

        loop {
            let step = self.next_step().await;
            match step {
                Step::ShutdownSignal { sender_alive } => {
                    if !sender_alive || *self.shutdown.borrow() {
                        break;
                    }
                }
                Step::Command(None) => break,
                Step::Command(Some(command)) => self.handle_command(command),
                Step::DeadlineElapsed => {
                    if let Some(op) = self.active.take() {
                        self.complete(&op, Err(OperationError::Timeout));
                    }
                }
                Step::Resolved(joined) => {
                    if let Some(op) = self.active.take() {
                        let result = flatten(&op, joined);
                        self.complete(&op, result);
                    }
                }
            }
        }

        if let Some(op) = self.active.take() {
            tracing::debug!(id = %op.id, seq = op.seq, "Detaching active operation on shutdown");
            counter!(OPERATIONS_DETACHED, "reason" => "shutdown").increment(1);
        }
        tracing::info!("Coordinator stopped");
    }

    async fn next_step(&mut self) -> Step {
        match self.active.as_mut() {
            Some(op) => tokio::select! {
                biased;
                changed = self.shutdown.changed() => Step::ShutdownSignal {
                    sender_alive: changed.is_ok(),
                },
                command = self.commands.recv() => Step::Command(command),
                () = op.deadline.as_mut() => Step::DeadlineElapsed,
                joined = &mut op.response => Step::Resolved(joined),
            },
            None => tokio::select! {
                biased;
                changed = self.shutdown.changed() => Step::ShutdownSignal {
                    sender_alive: changed.is_ok(),
                },
                command = self.commands.recv() => Step::Command(command),
            },
        }
    }

    fn handle_command(&mut self, command: Command) {
        counter!(COMMANDS_TOTAL, "command" => command.name()).increment(1);
        tracing::debug!(command = command.name(), "Processing command");

        match command {
            Command::Requested { id } => {
                if let Some(previous) = self.active.take() {
                    tracing::trace!(
                        id = %previous.id,
                        seq = previous.seq,
                        "Superseded by newer request"
                    );
                    counter!(OPERATIONS_DETACHED, "reason" => "superseded").increment(1);
                }
                self.start(id);
            }
            Command::Canceled => match self.active.take() {
                Some(previous) => {
                    tracing::debug!(id = %previous.id, seq = previous.seq, "Operation canceled");
                    counter!(OPERATIONS_DETACHED, "reason" => "canceled").increment(1);
                }
                None => tracing::trace!("Cancel with no active operation"),
            },
        }
    }

    fn start(&mut self, id: String) {
        let seq = self.next_seq;
        self.next_seq += 1;

        let response = tokio::spawn(self.backend.request(&id));
        tracing::debug!(id = %id, seq, "Operation started");
        counter!(OPERATIONS_STARTED).increment(1);

        self.active = Some(ActiveOperation {
            id,
            seq,
            started: Instant::now(),
            deadline: Box::pin(tokio::time::sleep(self.request_timeout)),
            response,
        });
    }

    fn complete(&self, op: &ActiveOperation, result: Result<Vec<i64>, OperationError>) {
        let event = match result {
            Ok(response) => OutcomeEvent::received(response),
            Err(error) => {
                tracing::debug!(id = %op.id, seq = op.seq, error = %error, "Operation failed");
                OutcomeEvent::failed(error)
            }
        };

        histogram!(OPERATION_DURATION).record(op.started.elapsed().as_secs_f64());
        counter!(OUTCOMES_TOTAL, "outcome" => event.name()).increment(1);
        tracing::debug!(id = %op.id, seq = op.seq, outcome = event.name(), "Emitting outcome");

        self.sink.emit(event);
    }
}

/// Collapse a joined backend task into the operation result
fn flatten(
    op: &ActiveOperation,
    joined: Result<Result<Vec<i64>, BackendError>, JoinError>,
) -> Result<Vec<i64>, OperationError> {
    match joined {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(error)) => {
            tracing::warn!(id = %op.id, seq = op.seq, error = %error, "Backend request failed");
            Err(OperationError::BackendFailure)
        }
        Err(join_error) => {
            tracing::error!(
                id = %op.id,
                seq = op.seq,
                error = %join_error,
                "Backend task did not complete"
            );
            Err(OperationError::BackendFailure)
        }
    }
}

/// Handle to a spawned coordinator
///
/// Dropping the handle stops the coordinator and detaches any active
/// operation.
#[derive(Debug)]
pub struct CoordinatorHandle {
    commands: mpsc::Sender<Command>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CoordinatorHandle {
    /// Queue a command
    ///
    /// # Errors
    ///
    /// Returns the command back if the coordinator has stopped.
    pub async fn send(&self, command: Command) -> Result<(), mpsc::error::SendError<Command>> {
        self.commands.send(command).await
    }

    /// A cloneable sender feeding this coordinator
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<Command> {
        self.commands.clone()
    }

    /// Check whether the coordinator task has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal shutdown and wait for the loop to exit
    ///
    /// # Errors
    ///
    /// Returns the [`JoinError`] if the coordinator task panicked.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        let _ = self.shutdown.send(true);
        self.task.await
    }
}
