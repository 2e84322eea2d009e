use std::sync::Arc;

use crossbeam_channel::Sender;
use vdb_types::{Hash, HashSet};

use crate::batch::{self, DEFAULT_BATCH_WORKERS};
use crate::chunk::Chunk;
use crate::error::ChunkResult;

/// Content-addressed chunk store with a compare-and-swap root.
///
/// An implementation is one *view* of some durable state. All
/// implementations must satisfy these invariants:
/// - A lookup miss returns the empty chunk (or `false`), never an error.
///   The empty hash is always a miss.
/// - `put` only appends to this view's private buffer. Buffered chunks are
///   readable through this view immediately and through no other view.
/// - `commit` persists the buffer and moves the durable root atomically,
///   and only if the durable root still equals `old_root`.
/// - Errors are reserved for backend failures (I/O, transport, timeouts)
///   and must leave the buffer intact.
pub trait ChunkStore: Send + Sync {
    /// Read a chunk from durable state or this view's buffer.
    ///
    /// Returns [`Chunk::empty`] if the chunk does not exist.
    fn get(&self, hash: &Hash) -> ChunkResult<Chunk>;

    /// Check whether a chunk exists, without materializing it if possible.
    fn has(&self, hash: &Hash) -> ChunkResult<bool> {
        Ok(!self.get(hash)?.is_empty())
    }

    /// Read a batch of chunks concurrently.
    ///
    /// Every chunk found is sent to `found`, in no particular order. Missing
    /// hashes are skipped; callers diff the requested set against what
    /// arrived. Returns once the whole batch has been looked up.
    fn get_many(&self, hashes: &HashSet, found: &Sender<Chunk>) -> ChunkResult<()> {
        batch::get_many(self, hashes, found)
    }

    /// Check a batch of hashes concurrently and return those that are absent.
    fn has_many(&self, hashes: &HashSet) -> ChunkResult<HashSet> {
        batch::has_many(self, hashes)
    }

    /// Buffer a chunk in this view. Putting the same chunk twice is a no-op.
    fn put(&self, chunk: Chunk) -> ChunkResult<()>;

    /// The root this view last observed.
    fn root(&self) -> Hash;

    /// Atomically persist buffered chunks and swap the durable root.
    ///
    /// Returns `Ok(false)`, leaving durable state untouched, if the durable
    /// root is not `old_root`. That outcome is expected under contention:
    /// callers `rebase` and decide whether to retry.
    fn commit(&self, new_root: &Hash, old_root: &Hash) -> ChunkResult<bool>;

    /// Refresh [`root`](ChunkStore::root) from durable state. The buffer is
    /// left alone.
    fn rebase(&self) -> ChunkResult<()>;

    /// Storage format tag of this store.
    fn version(&self) -> &str;

    /// Upper bound on worker threads used by batched calls.
    fn batch_workers(&self) -> usize {
        DEFAULT_BATCH_WORKERS
    }
}

/// Hands out chunk store views keyed by namespace.
///
/// Two views created for the same namespace share durable state but keep
/// separate write buffers.
pub trait StoreFactory: Send + Sync {
    /// Create a new view of the store for `namespace`.
    ///
    /// Calling this after [`shutter`](StoreFactory::shutter) is an
    /// invariant violation and aborts.
    fn create_store(&self, namespace: &str) -> Arc<dyn ChunkStore>;

    /// Release every store this factory owns.
    fn shutter(&self);
}
