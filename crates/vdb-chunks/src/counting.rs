//! Instrumented store views for tests and transfer accounting.
//!
//! [`CountingStoreView`] forwards every call to an inner store and counts
//! reads, existence checks and writes. Batched calls count one per hash
//! requested, so totals are comparable across batched and unbatched code.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::Sender;
use vdb_types::{invariant_violation, Hash, HashSet};

use crate::chunk::Chunk;
use crate::error::ChunkResult;
use crate::memory::MemoryStorage;
use crate::traits::{ChunkStore, StoreFactory};

/// Snapshot of a [`CountingStoreView`]'s counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub reads: usize,
    pub hases: usize,
    pub writes: usize,
}

/// A [`ChunkStore`] wrapper that counts traffic.
pub struct CountingStoreView {
    inner: Arc<dyn ChunkStore>,
    reads: AtomicUsize,
    hases: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingStoreView {
    pub fn new(inner: Arc<dyn ChunkStore>) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
            hases: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Current counter values.
    pub fn counts(&self) -> StoreCounts {
        StoreCounts {
            reads: self.reads.load(Ordering::SeqCst),
            hases: self.hases.load(Ordering::SeqCst),
            writes: self.writes.load(Ordering::SeqCst),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.reads.store(0, Ordering::SeqCst);
        self.hases.store(0, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
    }
}

impl ChunkStore for CountingStoreView {
    fn get(&self, hash: &Hash) -> ChunkResult<Chunk> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(hash)
    }

    fn has(&self, hash: &Hash) -> ChunkResult<bool> {
        self.hases.fetch_add(1, Ordering::SeqCst);
        self.inner.has(hash)
    }

    fn get_many(&self, hashes: &HashSet, found: &Sender<Chunk>) -> ChunkResult<()> {
        self.reads.fetch_add(hashes.len(), Ordering::SeqCst);
        self.inner.get_many(hashes, found)
    }

    fn has_many(&self, hashes: &HashSet) -> ChunkResult<HashSet> {
        self.hases.fetch_add(hashes.len(), Ordering::SeqCst);
        self.inner.has_many(hashes)
    }

    fn put(&self, chunk: Chunk) -> ChunkResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.put(chunk)
    }

    fn root(&self) -> Hash {
        self.inner.root()
    }

    fn commit(&self, new_root: &Hash, old_root: &Hash) -> ChunkResult<bool> {
        self.inner.commit(new_root, old_root)
    }

    fn rebase(&self) -> ChunkResult<()> {
        self.inner.rebase()
    }

    fn version(&self) -> &str {
        self.inner.version()
    }

    fn batch_workers(&self) -> usize {
        self.inner.batch_workers()
    }
}

/// Factory of [`CountingStoreView`]s over in-memory storage.
pub struct CountingStoreFactory {
    stores: Mutex<Option<HashMap<String, MemoryStorage>>>,
}

impl CountingStoreFactory {
    pub fn new() -> Self {
        Self {
            stores: Mutex::new(Some(HashMap::new())),
        }
    }

    /// Like [`StoreFactory::create_store`] but keeps the concrete type so the
    /// counters stay reachable.
    pub fn create_counting_store(&self, namespace: &str) -> Arc<CountingStoreView> {
        let mut stores = self
            .stores
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(stores) = stores.as_mut() else {
            invariant_violation("cannot use CountingStoreFactory after shutter()");
        };
        let storage = stores.entry(namespace.to_string()).or_default();
        Arc::new(CountingStoreView::new(Arc::new(storage.new_view())))
    }
}

impl Default for CountingStoreFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreFactory for CountingStoreFactory {
    fn create_store(&self, namespace: &str) -> Arc<dyn ChunkStore> {
        self.create_counting_store(namespace)
    }

    fn shutter(&self) {
        let mut stores = self
            .stores
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *stores = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance;

    #[test]
    fn passes_conformance_suite() {
        conformance::run_all(&CountingStoreFactory::new());
    }

    #[test]
    fn counts_single_calls() {
        let factory = CountingStoreFactory::new();
        let store = factory.create_counting_store("ns");
        let chunk = Chunk::new(&b"abc"[..]);

        store.put(chunk.clone()).unwrap();
        store.get(&chunk.hash()).unwrap();
        store.has(&chunk.hash()).unwrap();
        store.has(&Hash::of(b"missing")).unwrap();

        assert_eq!(
            store.counts(),
            StoreCounts {
                reads: 1,
                hases: 2,
                writes: 1
            }
        );
    }

    #[test]
    fn batched_calls_count_per_hash() {
        let factory = CountingStoreFactory::new();
        let store = factory.create_counting_store("ns");
        let hashes: HashSet = [b"a", b"b", b"c"].iter().map(|d| Hash::of(*d)).collect();

        let (tx, _rx) = crossbeam_channel::unbounded();
        store.get_many(&hashes, &tx).unwrap();
        let absent = store.has_many(&hashes).unwrap();

        assert_eq!(absent.len(), 3);
        let counts = store.counts();
        assert_eq!(counts.reads, 3);
        assert_eq!(counts.hases, 3);
    }

    #[test]
    fn reset_zeroes_counters() {
        let factory = CountingStoreFactory::new();
        let store = factory.create_counting_store("ns");
        store.put(Chunk::new(&b"x"[..])).unwrap();
        store.reset();
        assert_eq!(store.counts(), StoreCounts::default());
    }

    #[test]
    #[should_panic(expected = "after shutter")]
    fn create_after_shutter_aborts() {
        let factory = CountingStoreFactory::new();
        factory.shutter();
        factory.create_store("ns");
    }
}
