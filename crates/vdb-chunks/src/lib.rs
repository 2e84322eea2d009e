//! Content-addressed chunk storage for the versioned database.
//!
//! A chunk store holds immutable byte payloads keyed by their BLAKE3 hash,
//! plus a single root hash that names the head of the history kept in the
//! store. Writes are buffered per view and only become durable, and visible
//! to other views, through an atomic compare-and-swap of the root.
//!
//! # Storage Backends
//!
//! All backends implement the [`ChunkStore`] trait and are handed out by a
//! [`StoreFactory`]:
//!
//! - [`MemoryStorage`] / [`MemoryStoreView`] -- in-memory reference backend
//! - [`CountingStoreView`] -- wrapper that counts reads, checks and writes
//!
//! # Design Rules
//!
//! 1. Chunks are immutable once constructed (content addressing guarantees this).
//! 2. A miss is not an error: lookups of unknown hashes return the empty chunk.
//! 3. `commit` is the only path to durability and succeeds only if the
//!    backend's root still equals the caller's expected prior root.
//! 4. Buffered puts are visible to the owning view only, until commit.
//! 5. Batched calls fan out over a bounded worker pool and return once the
//!    whole batch has completed.
//!
//! Every backend should pass the checks in [`conformance`].

pub mod batch;
pub mod chunk;
pub mod conformance;
pub mod counting;
pub mod error;
pub mod memory;
pub mod traits;

pub use batch::DEFAULT_BATCH_WORKERS;
pub use chunk::Chunk;
pub use counting::{CountingStoreFactory, CountingStoreView, StoreCounts};
pub use error::{ChunkError, ChunkResult};
pub use memory::{MemoryStorage, MemoryStoreFactory, MemoryStoreView};
pub use traits::{ChunkStore, StoreFactory};

/// Storage format tag every store reports through [`ChunkStore::version`].
pub const FORMAT_VERSION: &str = "1";
