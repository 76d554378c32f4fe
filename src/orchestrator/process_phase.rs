//! Phase B -- transform every input file on the CPU pool.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use super::{Orchestrator, summarize};
use crate::error::Result;
use crate::pool::{PoolConfig, Task, TaskPool};
use crate::types::{BatchSummary, ItemId, Phase};
use crate::utils;

impl Orchestrator {
    /// Transform every matching file of `input_dir` into `output_dir`
    ///
    /// Inputs are the files with the configured extension, sorted by name.
    /// Transforms are not retried: a failure is recorded once and no output is
    /// written for that file. Fails only if a directory cannot be prepared or
    /// listed.
    pub async fn process_all(&self, input_dir: &Path, output_dir: &Path) -> Result<BatchSummary> {
        utils::ensure_dir(output_dir).await?;
        let inputs = utils::list_inputs(input_dir, self.config.extension()).await?;

        let pool = TaskPool::new(
            PoolConfig::cpu(self.config.process.cpu_workers),
            self.cancel.clone(),
        );

        tracing::info!(
            items = inputs.len(),
            workers = pool.config().effective_workers(),
            input = %input_dir.display(),
            output = %output_dir.display(),
            "Processing items"
        );

        let started = Instant::now();
        let tasks: Vec<Task<()>> = assign_ids(inputs)
            .into_iter()
            .map(|(id, input)| self.transform_task(id, input, output_dir))
            .collect();

        let outcomes = pool.run(tasks).await;
        Ok(summarize(Phase::Process, outcomes, started))
    }

    fn transform_task(&self, id: ItemId, input: PathBuf, output_dir: &Path) -> Task<()> {
        let transform = Arc::clone(&self.transform);
        let output = match input.file_name() {
            Some(name) => output_dir.join(name),
            None => output_dir.join(id.to_string()),
        };

        Task::blocking(id, move || {
            transform.apply(&input, &output)?;
            tracing::debug!(item_id = %id, output = %output.display(), "Item processed");
            Ok(())
        })
    }
}

/// Pair each input with an item id
///
/// Ids come from numeric file stems. Files without one, or whose number is
/// already taken, get ids past the largest numeric one in listing order; once
/// the id range is exhausted such files are skipped.
fn assign_ids(inputs: Vec<PathBuf>) -> Vec<(ItemId, PathBuf)> {
    let parsed: Vec<Option<ItemId>> = inputs.iter().map(|p| utils::item_id_from_path(p)).collect();
    let mut next_free = parsed
        .iter()
        .flatten()
        .map(ItemId::get)
        .max()
        .unwrap_or(0);
    let mut taken = HashSet::new();

    inputs
        .into_iter()
        .zip(parsed)
        .filter_map(|(path, parsed)| {
            let id = match parsed {
                Some(id) if taken.insert(id) => id,
                _ => {
                    let Some(next) = next_free.checked_add(1) else {
                        tracing::warn!(path = %path.display(), "No item id left, skipping file");
                        return None;
                    };
                    next_free = next;
                    taken.insert(ItemId(next));
                    ItemId(next)
                }
            };
            Some((id, path))
        })
        .collect()
}
