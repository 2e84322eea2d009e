//! Bounded fan-out for batched store queries.
//!
//! A batch is queued on a `crossbeam-channel` and drained by at most
//! `workers` scoped threads, so a slow lookup never holds back work an idle
//! worker could take. The call returns once the queue is empty and every
//! worker has stopped; the first backend error (if any) is reported then.

use std::thread;

use crossbeam_channel::Sender;
use tracing::debug;
use vdb_types::{Hash, HashSet};

use crate::chunk::Chunk;
use crate::error::ChunkResult;
use crate::traits::ChunkStore;

/// Worker bound used when a store does not configure its own.
pub const DEFAULT_BATCH_WORKERS: usize = 8;

/// Look up every hash in `hashes` and send each chunk found to `found`.
pub fn get_many<S>(store: &S, hashes: &HashSet, found: &Sender<Chunk>) -> ChunkResult<()>
where
    S: ChunkStore + ?Sized,
{
    fan_out(store.batch_workers(), hashes, |hash| {
        let chunk = store.get(hash)?;
        if !chunk.is_empty() {
            // A dropped receiver only means nobody wants the rest of the batch.
            let _ = found.send(chunk);
        }
        Ok(())
    })
}

/// Return the subset of `hashes` that `store` does not have.
pub fn has_many<S>(store: &S, hashes: &HashSet) -> ChunkResult<HashSet>
where
    S: ChunkStore + ?Sized,
{
    let (absent_tx, absent_rx) = crossbeam_channel::unbounded();
    fan_out(store.batch_workers(), hashes, |hash| {
        if !store.has(hash)? {
            let _ = absent_tx.send(*hash);
        }
        Ok(())
    })?;
    drop(absent_tx);
    Ok(absent_rx.into_iter().collect())
}

fn fan_out<F>(workers: usize, hashes: &HashSet, lookup: F) -> ChunkResult<()>
where
    F: Fn(&Hash) -> ChunkResult<()> + Sync,
{
    if hashes.is_empty() {
        return Ok(());
    }
    let workers = workers.clamp(1, hashes.len());
    debug!(batch = hashes.len(), workers, "dispatching batch");

    let (work_tx, work_rx) = crossbeam_channel::unbounded();
    for hash in hashes {
        // The receiver is still held here.
        let _ = work_tx.send(*hash);
    }
    drop(work_tx);

    let lookup = &lookup;
    let outcomes = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let work_rx = work_rx.clone();
                scope.spawn(move || -> ChunkResult<()> {
                    for hash in work_rx.iter() {
                        lookup(&hash)?;
                    }
                    Ok(())
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join())
            .collect::<Vec<_>>()
    });

    let mut first_error = None;
    for outcome in outcomes {
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                first_error.get_or_insert(e);
            }
            // Invariant violations inside a worker stay fatal for the caller.
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
    first_error.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChunkError;
    use crate::memory::MemoryStorage;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn hashes_of(inputs: &[&str]) -> HashSet {
        inputs.iter().map(|s| Hash::of(s.as_bytes())).collect()
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let calls = AtomicUsize::new(0);
        fan_out(4, &HashSet::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn every_hash_is_visited_once() {
        let hashes = hashes_of(&["a", "b", "c", "d", "e", "f", "g"]);
        let calls = AtomicUsize::new(0);
        fan_out(3, &hashes, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), hashes.len());
    }

    #[test]
    fn idle_workers_take_queued_work() {
        let hashes = hashes_of(&["a", "b", "c", "d", "e", "f"]);
        let held = AtomicBool::new(false);
        let by_others = AtomicUsize::new(0);
        fan_out(2, &hashes, |_| {
            if held.swap(true, Ordering::SeqCst) {
                by_others.fetch_add(1, Ordering::SeqCst);
                return Ok(());
            }
            // Stall the first lookup until the rest of the batch is done.
            let deadline = Instant::now() + Duration::from_secs(5);
            while by_others.load(Ordering::SeqCst) < 5 && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(by_others.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn zero_workers_still_runs() {
        let hashes = hashes_of(&["a", "b"]);
        let calls = AtomicUsize::new(0);
        fan_out(0, &hashes, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn error_is_reported_after_batch_completes() {
        let hashes = hashes_of(&["a", "b", "c", "d"]);
        let calls = AtomicUsize::new(0);
        let result = fan_out(1, &hashes, |_| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(ChunkError::Backend("timeout".into()));
            }
            Ok(())
        });
        assert!(matches!(result, Err(ChunkError::Backend(_))));
        // A single worker stops at its first failure.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "worker blew up")]
    fn worker_panic_propagates() {
        let hashes = hashes_of(&["a"]);
        let _ = fan_out(2, &hashes, |_| panic!("worker blew up"));
    }

    #[test]
    fn get_many_delivers_found_chunks_only() {
        let view = MemoryStorage::new().new_view();
        let present = Chunk::new(&b"present"[..]);
        view.put(present.clone()).unwrap();

        let mut wanted = HashSet::new();
        wanted.insert(present.hash());
        wanted.insert(Hash::of(b"missing"));

        let (tx, rx) = crossbeam_channel::unbounded();
        get_many(&view, &wanted, &tx).unwrap();
        drop(tx);
        let delivered: Vec<Chunk> = rx.into_iter().collect();
        assert_eq!(delivered, vec![present]);
    }

    #[test]
    fn has_many_returns_absent_subset() {
        let view = MemoryStorage::new().new_view();
        let present = Chunk::new(&b"present"[..]);
        view.put(present.clone()).unwrap();

        let missing = Hash::of(b"missing");
        let mut wanted = HashSet::new();
        wanted.insert(present.hash());
        wanted.insert(missing);
        wanted.insert(Hash::empty());

        let absent = has_many(&view, &wanted).unwrap();
        assert_eq!(absent.len(), 2);
        assert!(absent.contains(&missing));
        assert!(absent.contains(&Hash::empty()));
    }
}
