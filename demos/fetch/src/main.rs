//! Fetch demo binary
//!
//! Drives a request lifecycle through success, timeout, supersession, and
//! cancellation, logging every state change.
//!
//! # Running
//!
//! ```bash
//! cargo run -p fetch-demo
//! ```
//!
//! Set `FETCH_BASE_URL` to fetch from a real service instead of the simulated
//! backend (`GET {FETCH_BASE_URL}/{id}` must return a JSON array of integers).
//! `LIFECYCLE_*` variables override the runtime configuration.

use lifecycle_core::{BackendError, BackendFuture, Command, FnBackend, RequestBackend, State};
use lifecycle_runtime::metrics::MetricsServer;
use lifecycle_runtime::{HttpBackend, Lifecycle, LifecycleConfig};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const WAIT: Duration = Duration::from_secs(5);

/// Backend standing in for a remote service
///
/// `slow` never answers in time, `fail` errors, anything else answers with
/// the id's bytes after 200ms.
fn simulated_backend() -> Box<dyn RequestBackend> {
    Box::new(FnBackend::new(|id: &str| -> BackendFuture {
        let id = id.to_string();
        Box::pin(async move {
            match id.as_str() {
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(Vec::new())
                }
                "fail" => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Err(BackendError::Status(503))
                }
                _ => {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(id.bytes().map(i64::from).collect())
                }
            }
        })
    }))
}

fn backend_from_env() -> anyhow::Result<Box<dyn RequestBackend>> {
    match std::env::var("FETCH_BASE_URL") {
        Ok(base_url) => {
            tracing::info!(%base_url, "Using HTTP backend");
            Ok(Box::new(HttpBackend::new(&base_url)?))
        }
        Err(_) => {
            tracing::info!("Using simulated backend");
            Ok(simulated_backend())
        }
    }
}

fn describe(state: &State) -> String {
    match state {
        State::Success { value } => format!("Success({value:?})"),
        State::Error { message } => format!("Error({message:?})"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fetch=info,lifecycle_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Fetch Demo: Request Lifecycle ===\n");

    let mut metrics = MetricsServer::new(SocketAddr::from(([127, 0, 0, 1], 9000)));
    metrics.start()?;

    let config = LifecycleConfig::from_env()?;
    let lifecycle = Lifecycle::with_config(backend_from_env()?, config)?;

    // Log every state change
    let mut changes = lifecycle.subscribe();
    let logger = tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(state) => tracing::info!(state = %describe(&state), "State changed"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "State logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    println!("Initial state: {}", describe(&lifecycle.current()));

    println!("\n>>> Requested(\"42\")");
    let state = lifecycle
        .send_and_wait(Command::requested("42"), WAIT)
        .await?;
    println!("State: {}", describe(&state));

    println!("\n>>> Requested(\"slow\") - backend outlives the deadline");
    let state = lifecycle
        .send_and_wait(Command::requested("slow"), WAIT)
        .await?;
    println!("State: {}", describe(&state));

    println!("\n>>> Requested(\"fail\")");
    let state = lifecycle
        .send_and_wait(Command::requested("fail"), WAIT)
        .await?;
    println!("State: {}", describe(&state));

    println!("\n>>> Requested(\"a\") then immediately Requested(\"b\")");
    lifecycle.send(Command::requested("a")).await?;
    let state = lifecycle
        .send_and_wait(Command::requested("b"), WAIT)
        .await?;
    println!("State: {} (only \"b\" completed)", describe(&state));

    println!("\n>>> Requested(\"c\") then Canceled");
    let before = lifecycle.current();
    lifecycle.send(Command::requested("c")).await?;
    lifecycle.send(Command::canceled()).await?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    let after = lifecycle.current();
    println!(
        "State: {} (unchanged: {})",
        describe(&after),
        std::sync::Arc::ptr_eq(&before, &after)
    );

    lifecycle.shutdown_default().await?;
    drop(lifecycle);
    let _ = logger.await;

    if let Some(payload) = metrics.render() {
        println!("\n=== Metrics ===\n{payload}");
    }

    Ok(())
}
