use thiserror::Error;
use vdb_chunks::ChunkError;
use vdb_datas::DatasError;
use vdb_types::Hash;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("database error: {0}")]
    Datas(#[from] DatasError),

    #[error("store error: {0}")]
    Chunk(#[from] ChunkError),

    /// Chunks reachable from the pulled commit that the store walked could
    /// not produce.
    #[error("{} reachable chunk(s) missing from the store", .0.len())]
    MissingChunks(Vec<Hash>),

    /// The sink's root moved while the pull was transferring chunks.
    #[error("dataset {dataset}: root is no longer {expected}; pull rejected")]
    ConcurrentModification { dataset: String, expected: Hash },
}

pub type SyncResult<T> = Result<T, SyncError>;
