//! Bounded task pool -- a fixed set of workers draining a fixed queue.
//!
//! One abstraction serves both phases; [`PoolProfile`] selects the concurrency
//! regime:
//! - [`PoolProfile::Io`] - many lightweight workers for latency-bound tasks
//! - [`PoolProfile::Cpu`] - at most one worker per available core
//!
//! Each worker pulls the next task as soon as it finishes the previous one.
//! Async work is spawned on the runtime; blocking work runs on the blocking
//! thread pool, so compute-heavy tasks execute truly in parallel. Every task is
//! spawned on its own, so a panic is contained and reported as that task's
//! outcome. Outcomes travel over a channel to the caller of [`TaskPool::run`],
//! which is the only place they are aggregated.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::types::ItemId;


/// Outcome channel capacity; workers block briefly if the aggregator lags
const OUTCOME_CHANNEL_BUFFER: usize = 256;

/// Default worker count for the I/O profile
pub const DEFAULT_IO_WORKERS: usize = 32;

/// Concurrency regime of a pool
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolProfile {
    /// Latency-bound work: the configured limit is used as-is
    Io,
    /// Compute-bound work: the limit is capped by the number of available cores
    Cpu,
}

/// Pool configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Concurrency regime
    pub profile: PoolProfile,
    /// Requested worker count; 0 is treated as 1
    pub concurrency: usize,
}

impl PoolConfig {
    /// I/O profile with `concurrency` workers
    pub fn io(concurrency: usize) -> Self {
        Self {
            profile: PoolProfile::Io,
            concurrency,
        }
    }

    /// CPU profile with at most `concurrency` workers
    pub fn cpu(concurrency: usize) -> Self {
        Self {
            profile: PoolProfile::Cpu,
            concurrency,
        }
    }

    /// Worker count actually used
    pub fn effective_workers(&self) -> usize {
        let requested = self.concurrency.max(1);
        match self.profile {
            PoolProfile::Io => requested,
            PoolProfile::Cpu => requested.min(available_cores()),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::io(DEFAULT_IO_WORKERS)
    }
}

/// Number of parallel execution units the OS reports, at least 1
pub fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

enum Work<T> {
    Async(BoxFuture<'static, Result<T>>),
    Blocking(Box<dyn FnOnce() -> Result<T> + Send + 'static>),
}

/// A unit of work tagged with the item it belongs to
pub struct Task<T> {
    id: ItemId,
    work: Work<T>,
}

impl<T: Send + 'static> Task<T> {
    /// Task backed by a future; suited to I/O-bound work
    pub fn future<F>(id: ItemId, fut: F) -> Self
    where
        F: std::future::Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            id,
            work: Work::Async(Box::pin(fut)),
        }
    }

    /// Task backed by a blocking closure; runs on its own OS thread
    pub fn blocking<F>(id: ItemId, f: F) -> Self
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        Self {
            id,
            work: Work::Blocking(Box::new(f)),
        }
    }

    /// Item this task belongs to
    pub fn id(&self) -> ItemId {
        self.id
    }
}

/// Result of one task, correlated by submission index and item id
#[derive(Debug)]
pub struct TaskOutcome<T> {
    /// Position of the task in the submitted sequence
    pub index: usize,
    /// Item the task belonged to
    pub id: ItemId,
    /// Value or error produced by the task
    pub result: Result<T>,
}

type Queue<T> = Arc<Mutex<VecDeque<(usize, Task<T>)>>>;

/// Runs batches of independent tasks with bounded concurrency
#[derive(Clone, Debug)]
pub struct TaskPool {
    config: PoolConfig,
    cancel: CancellationToken,
}

impl TaskPool {
    /// Create a pool; it stops pulling work once `cancel` fires
    pub fn new(config: PoolConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    /// Pool configuration
    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// Run every task and return exactly one outcome per task, in completion order
    ///
    /// At most [`PoolConfig::effective_workers`] tasks execute at any instant.
    /// After cancellation, tasks still queued are not started and yield
    /// [`Error::Cancelled`]; tasks already running finish normally.
    pub async fn run<T: Send + 'static>(&self, tasks: Vec<Task<T>>) -> Vec<TaskOutcome<T>> {
        let total = tasks.len();
        if total == 0 {
            return Vec::new();
        }

        let submitted: Vec<ItemId> = tasks.iter().map(Task::id).collect();
        let workers = self.config.effective_workers().min(total);
        let queue: Queue<T> = Arc::new(Mutex::new(tasks.into_iter().enumerate().collect()));
        let (outcome_tx, mut outcome_rx) = mpsc::channel(OUTCOME_CHANNEL_BUFFER);

        tracing::debug!(
            profile = ?self.config.profile,
            workers,
            tasks = total,
            "Starting task pool"
        );

        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    Arc::clone(&queue),
                    outcome_tx.clone(),
                    self.cancel.clone(),
                ))
            })
            .collect();
        drop(outcome_tx);

        let mut outcomes = Vec::with_capacity(total);
        while let Some(outcome) = outcome_rx.recv().await {
            outcomes.push(outcome);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Pool worker terminated abnormally");
            }
        }

        if outcomes.len() < total {
            fill_missing(&mut outcomes, &submitted);
        }
        outcomes
    }
}

/// Pull tasks until the queue is empty, reporting each outcome
async fn worker_loop<T: Send + 'static>(
    worker: usize,
    queue: Queue<T>,
    outcome_tx: mpsc::Sender<TaskOutcome<T>>,
    cancel: CancellationToken,
) {
    loop {
        let next = queue.lock().await.pop_front();
        let Some((index, task)) = next else {
            break;
        };

        let id = task.id;
        let result = if cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            execute(task.work).await
        };

        if outcome_tx
            .send(TaskOutcome { index, id, result })
            .await
            .is_err()
        {
            tracing::warn!(worker, item_id = %id, "Outcome receiver dropped, stopping worker");
            break;
        }
    }
}

/// Run one unit of work in its own task so a panic stays contained
async fn execute<T: Send + 'static>(work: Work<T>) -> Result<T> {
    let joined = match work {
        Work::Async(fut) => tokio::spawn(fut).await,
        Work::Blocking(f) => tokio::task::spawn_blocking(f).await,
    };

    joined.unwrap_or_else(|e| Err(Error::TaskPanicked(panic_message(e))))
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Give every submitted task without an outcome an explicit failure
fn fill_missing<T>(outcomes: &mut Vec<TaskOutcome<T>>, submitted: &[ItemId]) {
    let mut seen = vec![false; submitted.len()];
    for outcome in outcomes.iter() {
        if let Some(slot) = seen.get_mut(outcome.index) {
            *slot = true;
        }
    }
    for (index, id) in submitted.iter().enumerate() {
        if !seen[index] {
            tracing::error!(item_id = %id, "Task produced no outcome");
            outcomes.push(TaskOutcome {
                index,
                id: *id,
                result: Err(Error::Other("task produced no outcome".to_string())),
            });
        }
    }
}
