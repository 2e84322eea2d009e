use std::collections::{HashMap, VecDeque};

use tracing::{debug, info, warn};
use vdb_chunks::{Chunk, ChunkStore};
use vdb_datas::{decode_value, Database, Dataset, Ref};
use vdb_types::{Hash, HashSet};

use crate::error::{SyncError, SyncResult};
use crate::types::{PullOptions, PullOutcome, PullReport, PullStrategy};

/// Replicate the history under `source_ref` from `source` into `sink`.
///
/// Fetches the chunks the sink is missing, buffers them in the sink only
/// once the whole walk has succeeded (children before parents), then moves
/// the sink's root from the root it observed at the start to
/// `source_ref.target`. If another writer moved the sink's root in the
/// meantime, nothing becomes durable and
/// [`SyncError::ConcurrentModification`] is returned; the caller rebases
/// and pulls again.
///
/// `source_ref` must name a commit. Anything else is a corrupted history
/// and aborts.
pub fn pull(
    sink: &Dataset,
    source: &Database,
    source_ref: &Ref,
    options: &PullOptions,
) -> SyncResult<PullOutcome> {
    source.validate_ref_as_commit(source_ref)?;

    let sink_db = sink.database();
    let old_root = sink_db.root();
    let target = source_ref.target;
    let batch_size = options.effective_batch_size();
    debug!(
        dataset = %sink.id(),
        from = %old_root.short_hex(),
        to = %target.short_hex(),
        strategy = ?options.strategy,
        "pull started"
    );

    let (report, fetched) = match options.strategy {
        PullStrategy::TopDown => pull_top_down(sink_db, source, target, batch_size)?,
        PullStrategy::Exclude => pull_excluding(sink_db, source, target, batch_size)?,
    };
    store_children_first(sink_db, fetched)?;

    if !sink_db.commit_root(&target, &old_root)? {
        warn!(
            dataset = %sink.id(),
            expected = %old_root.short_hex(),
            "sink root moved during pull"
        );
        return Err(SyncError::ConcurrentModification {
            dataset: sink.id().to_string(),
            expected: old_root,
        });
    }

    info!(
        dataset = %sink.id(),
        head = %target.short_hex(),
        rounds = report.rounds,
        chunks = report.chunks_transferred,
        bytes = report.bytes_transferred,
        "pull complete"
    );
    Ok(PullOutcome {
        dataset: sink.clone(),
        report,
    })
}

fn pull_top_down(
    sink: &Database,
    source: &Database,
    target: Hash,
    batch_size: usize,
) -> SyncResult<(PullReport, Vec<Fetched>)> {
    let mut report = PullReport::default();
    let mut fetched = Vec::new();
    let mut frontier = Frontier::new(target, HashSet::new());

    while !frontier.is_empty() {
        let batch = frontier.next_batch(batch_size);
        report.rounds += 1;
        report.hashes_checked += batch.len();

        // Present chunks are pruned: their closure is already in the sink.
        let absent = sink.store().has_many(&batch)?;
        if !absent.is_empty() {
            let chunks = fetch(source.store().as_ref(), &absent)?;
            collect_chunks(chunks, &mut frontier, &mut report, &mut fetched)?;
        }
        debug!(
            round = report.rounds,
            checked = batch.len(),
            absent = absent.len(),
            "pull round"
        );
    }
    Ok((report, fetched))
}

fn pull_excluding(
    sink: &Database,
    source: &Database,
    target: Hash,
    batch_size: usize,
) -> SyncResult<(PullReport, Vec<Fetched>)> {
    let excluded = closure(sink.store().as_ref(), sink.root(), batch_size)?;
    let mut report = PullReport {
        excluded: excluded.len(),
        ..PullReport::default()
    };
    let mut fetched = Vec::new();
    let mut frontier = Frontier::new(target, excluded);

    while !frontier.is_empty() {
        let batch = frontier.next_batch(batch_size);
        report.rounds += 1;
        let chunks = fetch(source.store().as_ref(), &batch)?;
        collect_chunks(chunks, &mut frontier, &mut report, &mut fetched)?;
        debug!(round = report.rounds, fetched = batch.len(), "pull round");
    }
    Ok((report, fetched))
}

/// A chunk copied from the source, with the hashes it refers to.
struct Fetched {
    chunk: Chunk,
    children: Vec<Hash>,
}

/// Queue the refs `chunks` hold and keep the chunks for the sink.
fn collect_chunks(
    chunks: Vec<Chunk>,
    frontier: &mut Frontier,
    report: &mut PullReport,
    fetched: &mut Vec<Fetched>,
) -> SyncResult<()> {
    for chunk in chunks {
        let children = child_hashes(&chunk)?;
        for child in &children {
            frontier.push(*child);
        }
        report.chunks_transferred += 1;
        report.bytes_transferred += chunk.len() as u64;
        fetched.push(Fetched { chunk, children });
    }
    Ok(())
}

/// Buffer walked chunks in the sink, each one after every fetched chunk it
/// refers to.
fn store_children_first(sink: &Database, fetched: Vec<Fetched>) -> SyncResult<()> {
    let order: Vec<Hash> = fetched.iter().map(|f| f.chunk.hash()).collect();
    let mut pending: HashMap<Hash, Fetched> =
        fetched.into_iter().map(|f| (f.chunk.hash(), f)).collect();

    // Depth-first post-order; content addressing rules out cycles.
    for start in order {
        let mut stack = vec![(start, false)];
        while let Some((hash, expanded)) = stack.pop() {
            if expanded {
                if let Some(done) = pending.remove(&hash) {
                    sink.store().put(done.chunk)?;
                }
                continue;
            }
            let Some(entry) = pending.get(&hash) else {
                continue;
            };
            stack.push((hash, true));
            for child in &entry.children {
                if pending.contains_key(child) {
                    stack.push((*child, false));
                }
            }
        }
    }
    Ok(())
}

/// Every hash reachable from `root` in `store`, `root` included.
fn closure(store: &dyn ChunkStore, root: Hash, batch_size: usize) -> SyncResult<HashSet> {
    let mut frontier = Frontier::new(root, HashSet::new());
    while !frontier.is_empty() {
        let batch = frontier.next_batch(batch_size);
        for chunk in fetch(store, &batch)? {
            for child in child_hashes(&chunk)? {
                frontier.push(child);
            }
        }
    }
    Ok(frontier.seen)
}

/// Read a batch of chunks, failing if any of them is missing.
fn fetch(store: &dyn ChunkStore, wanted: &HashSet) -> SyncResult<Vec<Chunk>> {
    let (found_tx, found_rx) = crossbeam_channel::unbounded();
    store.get_many(wanted, &found_tx)?;
    drop(found_tx);

    let chunks: Vec<Chunk> = found_rx.iter().collect();
    let arrived: HashSet = chunks.iter().map(Chunk::hash).collect();
    let mut missing: Vec<Hash> = wanted.difference(&arrived).copied().collect();
    if !missing.is_empty() {
        missing.sort();
        return Err(SyncError::MissingChunks(missing));
    }
    Ok(chunks)
}

fn child_hashes(chunk: &Chunk) -> SyncResult<Vec<Hash>> {
    let value = decode_value(chunk)?;
    Ok(value.child_refs().into_iter().map(|r| r.target).collect())
}

/// Breadth-first work queue. A hash is queued at most once, and never if it
/// was in the initial skip set.
struct Frontier {
    queue: VecDeque<Hash>,
    seen: HashSet,
}

impl Frontier {
    fn new(start: Hash, skip: HashSet) -> Self {
        let mut frontier = Self {
            queue: VecDeque::new(),
            seen: skip,
        };
        frontier.push(start);
        frontier
    }

    fn push(&mut self, hash: Hash) {
        if !hash.is_empty() && self.seen.insert(hash) {
            self.queue.push_back(hash);
        }
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn next_batch(&mut self, size: usize) -> HashSet {
        let n = size.min(self.queue.len());
        self.queue.drain(..n).collect()
    }
}
