//! Core types for batchpipe

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Identifier of one unit of work, 1-based and unique within a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl ItemId {
    /// Create a new ItemId
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the inner u32 value
    pub fn get(&self) -> u32 {
        self.0
    }

    /// File name for this item: the id zero-padded to three digits plus `ext`
    pub fn file_name(&self, ext: &str) -> String {
        format!("{:03}.{}", self.0, ext)
    }
}

impl From<u32> for ItemId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ItemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// One unit of fetch work
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkItem {
    /// Item identity
    pub id: ItemId,
    /// Remote locator derived from the id (zero-padded file name)
    pub source_locator: String,
    /// Attempt budget, always at least 1
    pub attempts_allowed: u32,
}

impl WorkItem {
    /// Build the work item for `id`, deriving its locator from `ext`
    pub fn new(id: ItemId, ext: &str, attempts_allowed: u32) -> Self {
        Self {
            id,
            source_locator: id.file_name(ext),
            attempts_allowed: attempts_allowed.max(1),
        }
    }
}

/// Outcome of processing one [`WorkItem`]
///
/// `error_detail` is present exactly when `success` is false; the constructors
/// are the only way to build one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkResult {
    id: ItemId,
    success: bool,
    error_detail: Option<String>,
}

impl WorkResult {
    /// Successful outcome
    pub fn ok(id: ItemId) -> Self {
        Self {
            id,
            success: true,
            error_detail: None,
        }
    }

    /// Failed outcome with the reason
    pub fn failed(id: ItemId, detail: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            error_detail: Some(detail.into()),
        }
    }

    /// Item identity
    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Whether the item succeeded
    pub fn success(&self) -> bool {
        self.success
    }

    /// Failure reason, `None` on success
    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }
}

/// Pipeline phase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Phase A: network fetch
    Fetch,
    /// Phase B: image transform
    Process,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Fetch => write!(f, "fetch"),
            Phase::Process => write!(f, "process"),
        }
    }
}

/// Aggregate over one phase's complete set of results
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Which phase this summarizes
    pub phase: Phase,
    /// Number of items submitted
    pub total_items: usize,
    /// Number of items that succeeded
    pub success_count: usize,
    /// Ids of items that failed
    pub failed_ids: BTreeSet<ItemId>,
    /// Failure reason per failed id
    pub failures: BTreeMap<ItemId, String>,
    /// Wall time of the phase
    pub elapsed: Duration,
}

impl BatchSummary {
    /// Build the summary from every result of a phase
    ///
    /// `total_items` is the number of results; a result per submitted item is
    /// guaranteed by [`crate::pool::TaskPool::run`].
    pub fn from_results(phase: Phase, results: &[WorkResult], elapsed: Duration) -> Self {
        let mut success_count = 0;
        let mut failures = BTreeMap::new();
        for result in results {
            if result.success() {
                success_count += 1;
            } else {
                failures.insert(
                    result.id(),
                    result.error_detail().unwrap_or_default().to_string(),
                );
            }
        }

        Self {
            phase,
            total_items: results.len(),
            success_count,
            failed_ids: failures.keys().copied().collect(),
            failures,
            elapsed,
        }
    }

    /// Number of failed items
    pub fn failed_count(&self) -> usize {
        self.failed_ids.len()
    }

    /// Elapsed wall time in seconds
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// Items per second over the phase; 0 when nothing was timed
    pub fn throughput_per_second(&self) -> f64 {
        let secs = self.elapsed_seconds();
        if secs > 0.0 {
            self.total_items as f64 / secs
        } else {
            0.0
        }
    }

    /// Average wall seconds per item; 0 for an empty phase
    pub fn avg_seconds_per_item(&self) -> f64 {
        if self.total_items == 0 {
            0.0
        } else {
            self.elapsed_seconds() / self.total_items as f64
        }
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "  {} completed in {:.2} s",
            self.phase,
            self.elapsed_seconds()
        )?;
        writeln!(f, "  Succeeded: {}/{}", self.success_count, self.total_items)?;
        if !self.failed_ids.is_empty() {
            let ids: Vec<String> = self.failed_ids.iter().map(|id| id.to_string()).collect();
            writeln!(
                f,
                "  Failed:    {} (ids: {})",
                self.failed_count(),
                ids.join(", ")
            )?;
            for (id, reason) in &self.failures {
                writeln!(f, "    {}: {}", id, reason)?;
            }
        }
        writeln!(f, "  Average:   {:.2} s/item", self.avg_seconds_per_item())?;
        write!(f, "  Speed:     {:.2} items/s", self.throughput_per_second())
    }
}

/// Run lifecycle: `Idle -> Fetching -> FetchComplete -> Processing -> Done`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Nothing started yet
    Idle,
    /// Phase A in progress
    Fetching,
    /// Phase A drained, phase B not started
    FetchComplete,
    /// Phase B in progress
    Processing,
    /// Both phases finished
    Done,
}

impl RunState {
    /// The only state that may follow this one, `None` once done
    pub fn next(self) -> Option<RunState> {
        match self {
            RunState::Idle => Some(RunState::Fetching),
            RunState::Fetching => Some(RunState::FetchComplete),
            RunState::FetchComplete => Some(RunState::Processing),
            RunState::Processing => Some(RunState::Done),
            RunState::Done => None,
        }
    }
}

/// Both phase summaries of a complete run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Phase A summary
    pub fetch: BatchSummary,
    /// Phase B summary
    pub process: BatchSummary,
    /// Wall time of the whole run
    pub total_elapsed: Duration,
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{rule}")?;
        writeln!(f, "TIMING SUMMARY\n")?;
        writeln!(f, "  Fetch:      {:.2} s", self.fetch.elapsed_seconds())?;
        writeln!(f, "  Process:    {:.2} s\n", self.process.elapsed_seconds())?;
        writeln!(f, "  Total:      {:.2} s", self.total_elapsed.as_secs_f64())?;
        write!(f, "{rule}")
    }
}
