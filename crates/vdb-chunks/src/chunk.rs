use std::fmt;

use bytes::Bytes;
use vdb_types::Hash;

use crate::error::{ChunkError, ChunkResult};

/// An immutable payload identified by the hash of its contents.
///
/// The empty chunk (empty hash, no data) stands for "absent": stores return
/// it on a lookup miss. A chunk built from zero bytes of data is *not*
/// empty; it has a real hash.
#[derive(Clone, PartialEq, Eq)]
pub struct Chunk {
    hash: Hash,
    data: Bytes,
}

impl Chunk {
    /// Build a chunk from data, computing its hash.
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            hash: Hash::of(&data),
            data,
        }
    }

    /// Build a chunk from data received alongside a claimed hash.
    ///
    /// Fails if the data does not hash to `hash`.
    pub fn with_hash(hash: Hash, data: impl Into<Bytes>) -> ChunkResult<Self> {
        let chunk = Self::new(data);
        if chunk.hash != hash {
            return Err(ChunkError::HashMismatch {
                expected: hash,
                computed: chunk.hash,
            });
        }
        Ok(chunk)
    }

    /// The absent chunk.
    pub fn empty() -> Self {
        Self {
            hash: Hash::empty(),
            data: Bytes::new(),
        }
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Returns `true` for the absent chunk.
    pub fn is_empty(&self) -> bool {
        self.hash.is_empty()
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("hash", &self.hash)
            .field("len", &self.data.len())
            .finish()
    }
}
