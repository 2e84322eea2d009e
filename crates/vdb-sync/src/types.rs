use vdb_datas::Dataset;

/// How a pull decides which chunks the sink is missing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PullStrategy {
    /// Walk the source from the pulled commit and ask the sink, one frontier
    /// batch at a time, which chunks it lacks. Anything the sink already
    /// has is pruned together with everything below it.
    #[default]
    TopDown,
    /// Walk the sink's own closure first, then copy every source chunk
    /// reachable from the pulled commit that is outside it. Never queries
    /// the sink for existence.
    Exclude,
}

/// Tuning for [`pull`](crate::pull).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PullOptions {
    pub strategy: PullStrategy,
    /// Frontier hashes handled per round. Values below 1 are treated as 1.
    pub batch_size: usize,
}

impl PullOptions {
    pub const DEFAULT_BATCH_SIZE: usize = 64;

    pub fn with_strategy(strategy: PullStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub(crate) fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}

impl Default for PullOptions {
    fn default() -> Self {
        Self {
            strategy: PullStrategy::default(),
            batch_size: Self::DEFAULT_BATCH_SIZE,
        }
    }
}

/// What a pull did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PullReport {
    /// Frontier batches processed.
    pub rounds: usize,
    pub chunks_transferred: usize,
    pub bytes_transferred: u64,
    /// Hashes whose presence in the sink was queried.
    pub hashes_checked: usize,
    /// Size of the sink closure excluded up front.
    pub excluded: usize,
}

#[derive(Clone, Debug)]
pub struct PullOutcome {
    /// The sink dataset, now headed by the pulled commit.
    pub dataset: Dataset,
    pub report: PullReport,
}
