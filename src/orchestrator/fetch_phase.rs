//! Phase A -- fetch every item id through the retry wrapper on the I/O pool.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use super::{Orchestrator, summarize};
use crate::error::Result;
use crate::pool::{PoolConfig, Task, TaskPool};
use crate::retry;
use crate::types::{BatchSummary, ItemId, Phase, WorkItem};
use crate::utils;

impl Orchestrator {
    /// Fetch items `1..=n` into `output_dir`, one file per item
    ///
    /// Each fetch is retried per the configured policy and written with a
    /// temp-then-rename so a file is either absent or complete. Existing files
    /// are overwritten. Fails only if `output_dir` cannot be created.
    pub async fn fetch_all(&self, n: u32, output_dir: &Path) -> Result<BatchSummary> {
        utils::ensure_dir(output_dir).await?;

        let fetch_cfg = &self.config.fetch;
        let ext = self.config.extension();
        let pool = TaskPool::new(PoolConfig::io(fetch_cfg.io_workers), self.cancel.clone());

        tracing::info!(
            items = n,
            workers = pool.config().effective_workers(),
            dir = %output_dir.display(),
            "Fetching items"
        );

        let started = Instant::now();
        let tasks: Vec<Task<usize>> = (1..=n)
            .map(|id| {
                let item = WorkItem::new(ItemId(id), ext, fetch_cfg.retry.max_attempts);
                self.fetch_task(item, output_dir)
            })
            .collect();

        let outcomes = pool.run(tasks).await;
        Ok(summarize(Phase::Fetch, outcomes, started))
    }

    /// Build the pool task for one item: retried fetch, then atomic write
    ///
    /// Cancelling the run abandons the item after its current attempt.
    fn fetch_task(&self, item: WorkItem, output_dir: &Path) -> Task<usize> {
        let fetcher = Arc::clone(&self.fetcher);
        let policy = crate::config::RetryConfig {
            max_attempts: item.attempts_allowed,
            ..self.config.fetch.retry.clone()
        };
        let cancel = self.cancel.clone();
        let destination = output_dir.join(&item.source_locator);
        let WorkItem {
            id, source_locator, ..
        } = item;

        Task::future(id, async move {
            let timeout = policy.attempt_timeout;
            let bytes = retry::attempt_until_cancelled(&policy, &cancel, || {
                let fetcher = Arc::clone(&fetcher);
                let locator = source_locator.clone();
                async move { fetcher.fetch(&locator, timeout).await }
            })
            .await?;

            utils::write_atomic(&destination, &bytes).await?;
            tracing::debug!(item_id = %id, bytes = bytes.len(), "Item fetched");
            Ok(bytes.len())
        })
    }
}
