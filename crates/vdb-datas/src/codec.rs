//! Value ⇄ chunk encoding.
//!
//! A value is stored as the bincode serialization of [`Value`]; the chunk
//! hash is the hash of those bytes.

use vdb_chunks::Chunk;

use crate::error::{DatasError, DatasResult};
use crate::value::Value;

/// Encode a value into a chunk.
pub fn encode_value(value: &Value) -> DatasResult<Chunk> {
    let data = bincode::serialize(value).map_err(|e| DatasError::Encoding(e.to_string()))?;
    Ok(Chunk::new(data))
}

/// Decode the value held by a chunk.
pub fn decode_value(chunk: &Chunk) -> DatasResult<Value> {
    bincode::deserialize(chunk.data()).map_err(|e| DatasError::Decoding {
        hash: chunk.hash(),
        reason: e.to_string(),
    })
}
