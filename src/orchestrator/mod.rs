//! Batch orchestrator -- the two-phase fetch-then-transform run.
//!
//! Split into focused submodules:
//! - [`fetch_phase`] - Phase A, retried fetches on the I/O pool
//! - [`process_phase`] - Phase B, transforms on the CPU pool
//!
//! Phase B starts only after every phase A task has reported. Its input set is
//! whatever the input directory holds at that point, so items that failed to
//! download are simply absent rather than tracked in a skip list.

mod fetch_phase;
mod process_phase;


use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::pool::TaskOutcome;
use crate::transform::{ImageChain, Transform};
use crate::types::{BatchSummary, Phase, RunReport, RunState, WorkResult};

/// Owns the collaborators and sequences a run
pub struct Orchestrator {
    config: Arc<Config>,
    fetcher: Arc<dyn Fetcher>,
    transform: Arc<dyn Transform>,
    cancel: CancellationToken,
    state: Mutex<RunState>,
}

impl Orchestrator {
    /// Create an orchestrator with explicit collaborators
    pub fn new(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        transform: Arc<dyn Transform>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            fetcher,
            transform,
            cancel: CancellationToken::new(),
            state: Mutex::new(RunState::Idle),
        })
    }

    /// Create an orchestrator that fetches over HTTP and applies [`ImageChain`]
    pub fn with_defaults(config: Config) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config.fetch.base_url)?);
        let transform = Arc::new(ImageChain::new(config.process.transform));
        Self::new(config, fetcher, transform)
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token that stops both pools from starting further tasks when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current run state
    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run phase A for the configured item count, then phase B over its output
    ///
    /// Setup errors abort the run; per-item failures are only counted.
    pub async fn run(&self) -> Result<RunReport> {
        let started = Instant::now();
        let fetch_cfg = &self.config.fetch;
        let process_cfg = &self.config.process;

        self.advance(RunState::Idle, RunState::Fetching)?;
        let fetch = self
            .fetch_all(fetch_cfg.item_count, &fetch_cfg.output_dir)
            .await?;
        self.advance(RunState::Fetching, RunState::FetchComplete)?;

        self.advance(RunState::FetchComplete, RunState::Processing)?;
        let process = self
            .process_all(&process_cfg.input_dir, &process_cfg.output_dir)
            .await?;
        self.advance(RunState::Processing, RunState::Done)?;

        let report = RunReport {
            fetch,
            process,
            total_elapsed: started.elapsed(),
        };
        tracing::info!(
            fetched = report.fetch.success_count,
            processed = report.process.success_count,
            total_secs = report.total_elapsed.as_secs_f64(),
            "Run complete"
        );
        Ok(report)
    }

    /// Move from `from` to `to`, rejecting anything but the next state in sequence
    fn advance(&self, from: RunState, to: RunState) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != from || from.next() != Some(to) {
            return Err(Error::Other(format!(
                "invalid run state transition {:?} -> {:?} (current {:?})",
                from, to, *state
            )));
        }
        tracing::debug!(from = ?from, to = ?to, "Run state transition");
        *state = to;
        Ok(())
    }
}

/// Turn pool outcomes into per-item results and summarize them
///
/// Task errors stop here: each becomes a failed [`WorkResult`].
fn summarize<T>(phase: Phase, outcomes: Vec<TaskOutcome<T>>, started: Instant) -> BatchSummary {
    let results: Vec<WorkResult> = outcomes
        .into_iter()
        .map(|outcome| match outcome.result {
            Ok(_) => WorkResult::ok(outcome.id),
            Err(e) => {
                tracing::warn!(
                    phase = %phase,
                    item_id = %outcome.id,
                    code = e.error_code(),
                    error = %e,
                    "Item failed"
                );
                WorkResult::failed(outcome.id, e.to_string())
            }
        })
        .collect();

    let summary = BatchSummary::from_results(phase, &results, started.elapsed());
    tracing::info!(
        phase = %phase,
        total = summary.total_items,
        succeeded = summary.success_count,
        failed = summary.failed_count(),
        elapsed_secs = summary.elapsed_seconds(),
        "Phase complete"
    );
    summary
}
