use vdb_types::Hash;

/// Errors from chunk store operations.
///
/// A lookup miss is never an error; see [`crate::Chunk::empty`].
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// Data does not hash to the hash it was presented with.
    #[error("hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch { expected: Hash, computed: Hash },

    /// A lock guarding store state was poisoned by a panicking thread.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// Failure reported by a storage or transport backend.
    #[error("backend error: {0}")]
    Backend(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for chunk store operations.
pub type ChunkResult<T> = Result<T, ChunkError>;
