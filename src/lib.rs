//! # batchpipe
//!
//! Two-phase batch engine: fetch N resources with bounded concurrency and
//! retries, then transform the fetched files on a bounded pool of parallel
//! workers, with per-item failure accounting for both phases.
//!
//! ## Design
//!
//! - **Bounded task pool** - one abstraction, two profiles (I/O and CPU)
//! - **Retry wrapper** - per-attempt timeout, fixed backoff, usable for any operation
//! - **Failure isolation** - a failing or panicking item never stops its siblings
//! - **Strict phases** - transforms start only after every fetch has reported
//!
//! ## Quick Start
//!
//! ```no_run
//! use batchpipe::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.fetch.item_count = 10;
//!
//!     let orchestrator = Orchestrator::with_defaults(config)?;
//!     let report = orchestrator.run().await?;
//!
//!     println!("{}", report.fetch);
//!     println!("{}", report.process);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Command line surface
pub mod cli;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Fetch collaborator
pub mod fetch;
/// Two-phase run orchestration
pub mod orchestrator;
/// Bounded task pool
pub mod pool;
/// Retry wrapper with per-attempt timeout
pub mod retry;
/// Image transform collaborator
pub mod transform;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, FetchConfig, ProcessConfig, RetryConfig, TransformParams};
pub use error::{Error, FetchError, Result, TransformError};
pub use fetch::{Fetcher, HttpFetcher};
pub use orchestrator::Orchestrator;
pub use pool::{PoolConfig, PoolProfile, Task, TaskOutcome, TaskPool};
pub use transform::{ImageChain, Transform};
pub use types::{BatchSummary, ItemId, Phase, RunReport, RunState, WorkItem, WorkResult};

/// Cancel `token` when the process receives a termination signal
///
/// Pools stop starting new tasks once the token fires. Fetches in flight are
/// abandoned after their current attempt, and the phase summaries report every
/// unfinished item as cancelled.
///
/// - **Unix:** listens for SIGTERM and SIGINT, falling back to Ctrl+C if registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn cancel_on_signal(token: tokio_util::sync::CancellationToken) {
    tokio::select! {
        _ = wait_for_signal() => {
            tracing::warn!("Cancelling run: no new tasks will be started");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
                _ = sigint.recv() => tracing::info!("Received SIGINT"),
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Signal registration failed, falling back to ctrl_c");
            ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c().await;
}

/// Resolve on Ctrl+C; never resolve if it cannot be listened for
async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn signal_listener_exits_when_run_finishes_first() {
        let token = CancellationToken::new();
        let listener = tokio::spawn(cancel_on_signal(token.clone()));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!listener.is_finished(), "no signal, no cancellation");

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), listener)
            .await
            .expect("listener must stop once the token is cancelled")
            .unwrap();
    }
}
