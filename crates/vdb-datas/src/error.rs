use thiserror::Error;
use vdb_chunks::ChunkError;
use vdb_types::Hash;

/// Errors from database and dataset operations.
#[derive(Debug, Error)]
pub enum DatasError {
    #[error("store error: {0}")]
    Chunk(#[from] ChunkError),

    /// The store was written in a format this layer does not understand.
    #[error("incompatible store version: expected {expected}, found {found}")]
    IncompatibleVersion { expected: String, found: String },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("cannot decode chunk {hash}: {reason}")]
    Decoding { hash: Hash, reason: String },

    /// A value does not have the commit shape.
    #[error("not a commit: {0}")]
    NotACommit(String),

    /// A value refers to a chunk the store does not have.
    #[error("dangling ref to {0}")]
    DanglingRef(Hash),

    #[error("invalid dataset id {id:?}: {reason}")]
    InvalidDatasetId { id: String, reason: String },

    #[error("dataset {0} has no head")]
    EmptyDataset(String),

    /// The root moved between reading the head and committing.
    #[error("dataset {dataset}: root is no longer {expected}; rebase and retry")]
    ConcurrentModification { dataset: String, expected: Hash },
}

/// Result alias for database operations.
pub type DatasResult<T> = Result<T, DatasError>;
