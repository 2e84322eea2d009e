use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};
use vdb_types::{invariant_violation, Hash};

use crate::batch::DEFAULT_BATCH_WORKERS;
use crate::chunk::Chunk;
use crate::error::{ChunkError, ChunkResult};
use crate::traits::{ChunkStore, StoreFactory};
use crate::FORMAT_VERSION;

/// Durable half of an in-memory store: committed chunks and the root.
#[derive(Default)]
struct Persisted {
    chunks: HashMap<Hash, Chunk>,
    root: Hash,
}

/// Shared durable state of an in-memory store.
///
/// Cloning a `MemoryStorage` yields another handle to the same state. Each
/// call to [`new_view`](MemoryStorage::new_view) creates an independent view
/// with its own write buffer.
#[derive(Clone)]
pub struct MemoryStorage {
    persisted: Arc<RwLock<Persisted>>,
    batch_workers: usize,
}

impl MemoryStorage {
    /// Create empty storage with an uninitialized (empty) root.
    pub fn new() -> Self {
        Self::with_batch_workers(DEFAULT_BATCH_WORKERS)
    }

    /// Create empty storage whose views use `workers` threads per batch.
    pub fn with_batch_workers(workers: usize) -> Self {
        Self {
            persisted: Arc::new(RwLock::new(Persisted::default())),
            batch_workers: workers.max(1),
        }
    }

    /// Open a new view, starting from the currently persisted root.
    pub fn new_view(&self) -> MemoryStoreView {
        MemoryStoreView {
            storage: self.clone(),
            root: RwLock::new(self.root()),
            pending: RwLock::new(HashMap::new()),
            batch_workers: self.batch_workers,
        }
    }

    /// The currently persisted root.
    pub fn root(&self) -> Hash {
        self.persisted
            .read()
            .map(|p| p.root)
            .unwrap_or_else(|poisoned| poisoned.into_inner().root)
    }

    /// Number of committed chunks.
    pub fn len(&self) -> usize {
        self.persisted
            .read()
            .map(|p| p.chunks.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().chunks.len())
    }

    /// Returns `true` if nothing has been committed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> ChunkResult<RwLockReadGuard<'_, Persisted>> {
        self.persisted
            .read()
            .map_err(|e| ChunkError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> ChunkResult<RwLockWriteGuard<'_, Persisted>> {
        self.persisted
            .write()
            .map_err(|e| ChunkError::LockPoisoned(e.to_string()))
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("chunk_count", &self.len())
            .field("root", &self.root())
            .finish()
    }
}

/// One view of a [`MemoryStorage`].
///
/// Puts land in a private buffer that is flushed to the shared storage only
/// by a successful [`commit`](ChunkStore::commit).
pub struct MemoryStoreView {
    storage: MemoryStorage,
    root: RwLock<Hash>,
    pending: RwLock<HashMap<Hash, Chunk>>,
    batch_workers: usize,
}

impl MemoryStoreView {
    /// Override the storage's worker count for this view's batched calls.
    pub fn with_batch_workers(mut self, workers: usize) -> Self {
        self.batch_workers = workers.max(1);
        self
    }

    /// Number of chunks buffered and not yet committed.
    pub fn pending_len(&self) -> usize {
        self.pending
            .read()
            .map(|p| p.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    /// The storage this view belongs to.
    pub fn storage(&self) -> &MemoryStorage {
        &self.storage
    }

    fn set_root(&self, root: Hash) -> ChunkResult<()> {
        let mut current = self
            .root
            .write()
            .map_err(|e| ChunkError::LockPoisoned(e.to_string()))?;
        *current = root;
        Ok(())
    }
}

impl ChunkStore for MemoryStoreView {
    fn get(&self, hash: &Hash) -> ChunkResult<Chunk> {
        if hash.is_empty() {
            return Ok(Chunk::empty());
        }
        {
            let pending = self
                .pending
                .read()
                .map_err(|e| ChunkError::LockPoisoned(e.to_string()))?;
            if let Some(chunk) = pending.get(hash) {
                return Ok(chunk.clone());
            }
        }
        let persisted = self.storage.read()?;
        Ok(persisted.chunks.get(hash).cloned().unwrap_or_else(Chunk::empty))
    }

    fn has(&self, hash: &Hash) -> ChunkResult<bool> {
        if hash.is_empty() {
            return Ok(false);
        }
        {
            let pending = self
                .pending
                .read()
                .map_err(|e| ChunkError::LockPoisoned(e.to_string()))?;
            if pending.contains_key(hash) {
                return Ok(true);
            }
        }
        Ok(self.storage.read()?.chunks.contains_key(hash))
    }

    fn put(&self, chunk: Chunk) -> ChunkResult<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        let mut pending = self
            .pending
            .write()
            .map_err(|e| ChunkError::LockPoisoned(e.to_string()))?;
        pending.entry(chunk.hash()).or_insert(chunk);
        Ok(())
    }

    fn root(&self) -> Hash {
        self.root
            .read()
            .map(|r| *r)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }

    fn commit(&self, new_root: &Hash, old_root: &Hash) -> ChunkResult<bool> {
        // The persisted write lock is the CAS critical section.
        let mut persisted = self.storage.write()?;
        if persisted.root != *old_root {
            warn!(
                expected = %old_root.short_hex(),
                actual = %persisted.root.short_hex(),
                "root moved; commit rejected"
            );
            return Ok(false);
        }

        let mut pending = self
            .pending
            .write()
            .map_err(|e| ChunkError::LockPoisoned(e.to_string()))?;
        let flushed = pending.len();
        for (hash, chunk) in pending.drain() {
            persisted.chunks.entry(hash).or_insert(chunk);
        }
        persisted.root = *new_root;
        drop(pending);
        drop(persisted);

        self.set_root(*new_root)?;
        debug!(root = %new_root.short_hex(), flushed, "commit persisted");
        Ok(true)
    }

    fn rebase(&self) -> ChunkResult<()> {
        let root = self.storage.read()?.root;
        self.set_root(root)
    }

    fn version(&self) -> &str {
        FORMAT_VERSION
    }

    fn batch_workers(&self) -> usize {
        self.batch_workers
    }
}

impl std::fmt::Debug for MemoryStoreView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStoreView")
            .field("root", &self.root())
            .field("pending", &self.pending_len())
            .finish()
    }
}

/// Factory handing out [`MemoryStoreView`]s, one [`MemoryStorage`] per
/// namespace.
pub struct MemoryStoreFactory {
    stores: Mutex<Option<HashMap<String, MemoryStorage>>>,
    batch_workers: usize,
}

impl MemoryStoreFactory {
    pub fn new() -> Self {
        Self::with_batch_workers(DEFAULT_BATCH_WORKERS)
    }

    /// Factory whose storages use `workers` threads per batch.
    pub fn with_batch_workers(workers: usize) -> Self {
        Self {
            stores: Mutex::new(Some(HashMap::new())),
            batch_workers: workers,
        }
    }

    /// Shared storage for `namespace`, created on first use.
    pub fn storage(&self, namespace: &str) -> MemoryStorage {
        let mut stores = self
            .stores
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(stores) = stores.as_mut() else {
            invariant_violation("cannot use MemoryStoreFactory after shutter()");
        };
        stores
            .entry(namespace.to_string())
            .or_insert_with(|| MemoryStorage::with_batch_workers(self.batch_workers))
            .clone()
    }
}

impl Default for MemoryStoreFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreFactory for MemoryStoreFactory {
    fn create_store(&self, namespace: &str) -> Arc<dyn ChunkStore> {
        Arc::new(self.storage(namespace).new_view())
    }

    fn shutter(&self) {
        let mut stores = self
            .stores
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *stores = None;
    }
}
